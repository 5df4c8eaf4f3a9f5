//! # docsync
//!
//! Room-scoped realtime document relay.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! docsync
//!
//! # Run with custom config
//! docsync --config /path/to/docsync.toml
//!
//! # Run with environment variables
//! DOCSYNC_PORT=8080 DOCSYNC_DATABASE_URL=postgres://db/docs docsync
//! ```

use anyhow::Result;
use docsync_server::{config, handlers, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "docsync=debug,docsync_core=debug,docsync_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting docsync server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
