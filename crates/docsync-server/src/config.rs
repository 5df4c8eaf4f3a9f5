//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (DOCSYNC_*)
//! - TOML configuration file
//! - Command line arguments (`--config <path>`)

use anyhow::{bail, Context, Result};
use docsync_core::GatewayConfig;
use docsync_store::PgStoreOptions;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file locations, in lookup order.
pub const CONFIG_PATHS: [&str; 3] = [
    "docsync.toml",
    "/etc/docsync/docsync.toml",
    "~/.config/docsync/docsync.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Durable store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cross-origin configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Static file serving.
    #[serde(default)]
    pub static_files: StaticFilesConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection attempt timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Delay between reconnect attempts in milliseconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Maximum pool size.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to make credentialed requests.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Static file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    /// Directory served for unmatched paths.
    #[serde(default = "default_static_dir")]
    pub directory: PathBuf,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum rooms a single connection may join.
    #[serde(default = "default_max_rooms")]
    pub max_rooms_per_session: usize,

    /// Outbound queue capacity per connection.
    #[serde(default = "default_queue_capacity")]
    pub session_queue_capacity: usize,

    /// Reject document updates from connections outside the room.
    #[serde(default)]
    pub require_membership: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("DOCSYNC_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("DOCSYNC_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_database_url() -> String {
    std::env::var("DOCSYNC_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost:5432/realtime-docs".to_string())
}

fn default_connect_timeout() -> u64 {
    5_000 // 5 seconds
}

fn default_retry_interval() -> u64 {
    5_000 // 5 seconds
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_allowed_origins() -> Vec<String> {
    parse_origins(
        &std::env::var("DOCSYNC_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string()),
    )
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_max_rooms() -> usize {
    100
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_metrics_port() -> u16 {
    9090
}

/// Split a comma-separated origin list, dropping blanks.
#[must_use]
pub fn parse_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            database: DatabaseConfig::default(),
            cors: CorsConfig::default(),
            static_files: StaticFilesConfig::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            connect_timeout_ms: default_connect_timeout(),
            retry_interval_ms: default_retry_interval(),
            max_connections: default_db_max_connections(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            directory: default_static_dir(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_rooms_per_session: default_max_rooms(),
            session_queue_capacity: default_queue_capacity(),
            require_membership: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the command line, a default path, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` is malformed, or if a config file
    /// exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        if let Some(path) = config_arg(std::env::args().skip(1))? {
            return Self::from_file(path);
        }

        for path in &CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it
    /// fails [`Config::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that would make the server misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a database timing value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.database.retry_interval_ms == 0 {
            bail!("database.retry_interval_ms must be greater than zero");
        }
        if self.database.connect_timeout_ms == 0 {
            bail!("database.connect_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}:{}", self.host, self.port))
    }

    /// Gateway settings derived from the limits section.
    #[must_use]
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            max_rooms_per_session: self.limits.max_rooms_per_session,
            queue_capacity: self.limits.session_queue_capacity,
            require_membership: self.limits.require_membership,
        }
    }

    /// Durable store options derived from the database section.
    #[must_use]
    pub fn store_options(&self) -> PgStoreOptions {
        PgStoreOptions {
            url: self.database.url.clone(),
            connect_timeout: Duration::from_millis(self.database.connect_timeout_ms),
            retry_interval: Duration::from_millis(self.database.retry_interval_ms),
            max_connections: self.database.max_connections,
        }
    }
}

/// Find `--config <path>` or `--config=<path>` in the arguments.
fn config_arg(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>> {
    while let Some(arg) = args.next() {
        if let Some(path) = arg.strip_prefix("--config=") {
            return Ok(Some(PathBuf::from(shellexpand::tilde(path).as_ref())));
        }
        if arg == "--config" {
            let Some(path) = args.next() else {
                bail!("--config requires a path");
            };
            return Ok(Some(PathBuf::from(shellexpand::tilde(&path).as_ref())));
        }
    }
    Ok(None)
}
