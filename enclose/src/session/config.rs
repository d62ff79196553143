//! Session and hub configuration models.

use std::time::Duration;

use crate::game::constants::{
    GRID_SIZE, IDLE_TIMEOUT, LIVENESS_INTERVAL, MAX_SESSIONS, SESSION_MAX_AGE, SWEEP_INTERVAL,
    WRITE_TIMEOUT,
};

/// Per-session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Side length of the board (64 in production)
    pub grid_size: usize,

    /// Silence after which a participant is evicted
    pub idle_timeout: Duration,

    /// Period of the liveness sweep
    pub liveness_interval: Duration,

    /// Age after which the hub discards the session
    pub max_age: Duration,

    /// Upper bound for delivering one outbound message
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            idle_timeout: IDLE_TIMEOUT,
            liveness_interval: LIVENESS_INTERVAL,
            max_age: SESSION_MAX_AGE,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_size < 2 {
            return Err("Grid size must be at least 2".to_string());
        }

        for (name, value) in [
            ("Idle timeout", self.idle_timeout),
            ("Liveness interval", self.liveness_interval),
            ("Session max age", self.max_age),
            ("Write timeout", self.write_timeout),
        ] {
            if value.is_zero() {
                return Err(format!("{name} must be greater than zero"));
            }
        }

        Ok(())
    }
}

/// Hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum number of registered sessions
    pub max_sessions: usize,

    /// Period of the expiry/empty sweep
    pub sweep_interval: Duration,

    /// Configuration handed to every new session
    pub session: SessionConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_sessions: MAX_SESSIONS,
            sweep_interval: SWEEP_INTERVAL,
            session: SessionConfig::default(),
        }
    }
}

impl HubConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_sessions == 0 {
            return Err("Max sessions must be at least 1".to_string());
        }

        if self.sweep_interval.is_zero() {
            return Err("Sweep interval must be greater than zero".to_string());
        }

        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = HubConfig::default();
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.session.grid_size, 64);
        assert_eq!(config.session.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.session.liveness_interval, Duration::from_secs(5));
        assert_eq!(config.session.max_age, Duration::from_secs(1800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_tiny_grid() {
        let config = SessionConfig {
            grid_size: 1,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_durations() {
        let config = SessionConfig {
            write_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("Write timeout"));

        let hub = HubConfig {
            max_sessions: 0,
            ..HubConfig::default()
        };
        assert!(hub.validate().is_err());
    }
}
