//! Prometheus metrics for monitoring server health and game activity.
//!
//! Recording is always safe: until [`init_metrics`] installs the exporter the
//! `metrics` macros are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use enclose_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connections_total();
//! metrics::admissions_total("admitted");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Set current active WebSocket connections count.
pub fn websocket_connections_active(count: usize) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Record the result of an admission attempt (`admitted`, `full`, `closed`).
pub fn admissions_total(outcome: &str) {
    metrics::counter!("admissions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set current registered sessions count.
pub fn active_sessions(count: usize) {
    metrics::gauge!("active_sessions").set(count as f64);
}

/// Increment accepted moves counter.
pub fn moves_total(captured: bool) {
    metrics::counter!("moves_total",
        "captured" => captured.to_string()
    )
    .increment(1);
}

/// Increment finished games counter.
pub fn games_finished_total() {
    metrics::counter!("games_finished_total").increment(1);
}

/// Record how long dispatching one inbound frame took.
pub fn dispatch_duration_ms(command: &str, duration_ms: f64) {
    metrics::histogram!("dispatch_duration_ms",
        "command" => command.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}
