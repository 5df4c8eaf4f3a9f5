//! # docsync server
//!
//! HTTP and WebSocket front end for the docsync relay.
//!
//! The real-time path terminates WebSockets and feeds the [`Gateway`]. The
//! save path serves the JSON API and feeds the [`PersistenceCoordinator`].
//! Both share an [`AppState`] but never call into each other.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use config::Config;
use docsync_core::Gateway;
use docsync_store::PersistenceCoordinator;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub coordinator: PersistenceCoordinator,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new app state with a gateway built from the config limits.
    #[must_use]
    pub fn new(config: Config, coordinator: PersistenceCoordinator) -> Self {
        Self {
            gateway: Arc::new(Gateway::with_config(config.gateway())),
            coordinator,
            config: Arc::new(config),
        }
    }
}

/// Build the full application: API, WebSocket endpoint, static files, CORS
/// and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);
    let static_files = ServeDir::new(&state.config.static_files.directory);

    Router::new()
        .merge(api::router())
        .merge(handlers::router(&state.config.transport.websocket_path))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Echo allow-listed origins with credentials allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            // A wildcard cannot be combined with credentials
            Ok(_) if origin == "*" => {
                warn!(origin = %origin, "Ignoring wildcard origin, list origins explicitly");
                None
            }
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
