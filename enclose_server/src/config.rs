//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.
//! Every value has a default matching the production deployment, so an empty
//! environment yields a working server.

use enclose::{
    HubConfig, SessionConfig,
    constants::{
        GRID_SIZE, IDLE_TIMEOUT, LIVENESS_INTERVAL, MAX_SESSIONS, SESSION_MAX_AGE, SWEEP_INTERVAL,
        WRITE_TIMEOUT,
    },
};
use std::{net::SocketAddr, time::Duration};

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Hub and per-session settings
    pub hub: HubConfig,
    /// Per-address admission limit
    pub rate_limit: RateLimitConfig,
    /// WebSocket timeouts
    pub transport: TransportConfig,
    /// Upper bound for graceful shutdown
    pub shutdown_timeout: Duration,
}

/// Admission rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Upgrades allowed per source address per window
    pub max_admissions: usize,
    /// Length of the fixed counting window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_admissions: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// WebSocket transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound for reading the upgrade request and answering it
    pub read_timeout: Duration,
    /// Upper bound for one socket write
    pub write_timeout: Duration,
    /// The connection closes after this long without any inbound frame
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: WRITE_TIMEOUT,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `metrics_override` - Optional metrics address override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        metrics_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND")?.unwrap_or_else(default_bind),
        };

        let metrics_bind = match metrics_override {
            Some(addr) => Some(addr),
            None => parse_addr("METRICS_BIND")?,
        };

        let write_timeout = secs_env_or("WS_WRITE_TIMEOUT_SECS", WRITE_TIMEOUT);

        let session = SessionConfig {
            grid_size: parse_env_or("GRID_SIZE", GRID_SIZE),
            idle_timeout: secs_env_or("IDLE_TIMEOUT_SECS", IDLE_TIMEOUT),
            liveness_interval: secs_env_or("LIVENESS_INTERVAL_SECS", LIVENESS_INTERVAL),
            max_age: secs_env_or("SESSION_MAX_AGE_SECS", SESSION_MAX_AGE),
            write_timeout,
        };

        let hub = HubConfig {
            max_sessions: parse_env_or("MAX_SESSIONS", MAX_SESSIONS),
            sweep_interval: secs_env_or("SWEEP_INTERVAL_SECS", SWEEP_INTERVAL),
            session,
        };

        let rate_limit = RateLimitConfig {
            max_admissions: parse_env_or("RATE_LIMIT_ADMISSIONS", 100),
            window: secs_env_or("RATE_LIMIT_WINDOW_SECS", Duration::from_secs(60)),
        };

        let transport = TransportConfig {
            read_timeout: secs_env_or("WS_READ_TIMEOUT_SECS", Duration::from_secs(5)),
            write_timeout,
            idle_timeout: secs_env_or("WS_IDLE_TIMEOUT_SECS", Duration::from_secs(30)),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            hub,
            rate_limit,
            transport,
            shutdown_timeout: secs_env_or("SHUTDOWN_TIMEOUT_SECS", Duration::from_secs(10)),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_admissions == 0 {
            return Err(ConfigError::Invalid {
                var: "RATE_LIMIT_ADMISSIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        for (var, value) in [
            ("RATE_LIMIT_WINDOW_SECS", self.rate_limit.window),
            ("WS_READ_TIMEOUT_SECS", self.transport.read_timeout),
            ("WS_IDLE_TIMEOUT_SECS", self.transport.idle_timeout),
            ("SHUTDOWN_TIMEOUT_SECS", self.shutdown_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        if self.transport.idle_timeout < self.hub.session.idle_timeout {
            return Err(ConfigError::Invalid {
                var: "WS_IDLE_TIMEOUT_SECS".to_string(),
                reason: format!(
                    "Must not be shorter than the session idle timeout ({}s)",
                    self.hub.session.idle_timeout.as_secs()
                ),
            });
        }

        self.hub.validate().map_err(|reason| ConfigError::Invalid {
            var: "hub settings".to_string(),
            reason,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_bind: None,
            hub: HubConfig::default(),
            rate_limit: RateLimitConfig::default(),
            transport: TransportConfig::default(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Parse an optional socket address variable; set but unparsable is an error.
fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("{raw:?} is not an IP:PORT address ({e})"),
        }),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_env_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
