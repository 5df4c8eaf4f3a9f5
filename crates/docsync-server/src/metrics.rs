//! Metrics collection and export for docsync.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use docsync_store::StorageTier;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "docsync_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "docsync_connections_active";
    pub const EVENTS_TOTAL: &str = "docsync_events_total";
    pub const EVENTS_BYTES: &str = "docsync_events_bytes";
    pub const ROOMS_ACTIVE: &str = "docsync_rooms_active";
    pub const SAVES_TOTAL: &str = "docsync_saves_total";
    pub const SAVE_FAILURES_TOTAL: &str = "docsync_save_failures_total";
    pub const STORE_CONNECTED: &str = "docsync_store_connected";
    pub const LATENCY_SECONDS: &str = "docsync_latency_seconds";
    pub const ERRORS_TOTAL: &str = "docsync_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::EVENTS_TOTAL, "Total number of events processed");
    metrics::describe_counter!(names::EVENTS_BYTES, "Total bytes of events processed");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of known rooms");
    metrics::describe_counter!(names::SAVES_TOTAL, "Document saves by storage tier");
    metrics::describe_counter!(
        names::SAVE_FAILURES_TOTAL,
        "Document saves rejected by the durable store"
    );
    metrics::describe_gauge!(
        names::STORE_CONNECTED,
        "Whether the durable store is connected (1) or not (0)"
    );
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Inbound event processing latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an event crossing the socket.
pub fn record_event(event: &'static str, bytes: usize, direction: &'static str) {
    counter!(names::EVENTS_TOTAL, "event" => event, "direction" => direction).increment(1);
    counter!(names::EVENTS_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record event processing latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Update the known room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record a successful save.
pub fn record_save(tier: StorageTier) {
    counter!(names::SAVES_TOTAL, "tier" => tier.as_str()).increment(1);
}

/// Record a failed save.
pub fn record_save_failure() {
    counter!(names::SAVE_FAILURES_TOTAL).increment(1);
}

/// Update the durable store connectivity gauge.
pub fn set_store_connected(connected: bool) {
    gauge!(names::STORE_CONNECTED).set(if connected { 1.0 } else { 0.0 });
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
