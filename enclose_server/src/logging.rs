//! Structured logging configuration.
//!
//! The game library logs through the `log` facade; the subscriber installed
//! here forwards those records into `tracing` alongside the server's own
//! structured events.

use std::{net::IpAddr, time::Duration};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,hyper=warn,tungstenite=warn";

/// Operations slower than this are logged at warn level
pub const SLOW_OPERATION: Duration = Duration::from_secs(1);

/// Install the global subscriber.
///
/// ```no_run
/// enclose_server::logging::init();
/// log::info!("visible through the tracing subscriber");
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Log a connection turned away before it was seated.
///
/// `reason` is a short machine-friendly tag (`rate_limited`, `full`,
/// `closed`); `message` is the text the client was sent.
pub fn log_admission_refused(reason: &str, ip_address: IpAddr, message: &str) {
    tracing::warn!(
        reason = reason,
        ip_address = %ip_address,
        "Admission refused: {}",
        message
    );
}

/// Record how long `operation` took; slow ones are raised to warn.
pub fn log_timing(operation: &str, elapsed: Duration, detail: Option<&str>) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed >= SLOW_OPERATION {
        tracing::warn!(operation, elapsed_ms, detail, "Slow operation");
    } else {
        tracing::trace!(operation, elapsed_ms, detail, "Timing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_log_helpers_without_subscriber() {
        log_admission_refused("rate_limited", IpAddr::from([127, 0, 0, 1]), "Too many requests");
        log_timing("dispatch", Duration::from_millis(3), Some("ready"));
        log_timing("dispatch", SLOW_OPERATION, None);
    }
}
