//! Per-address admission limiter for WebSocket upgrades.
//!
//! Each source IP may start a bounded number of connections per window. All
//! counters are cleared together at the end of every window.

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use crate::config::RateLimitConfig;

/// Fixed-window admission counter keyed by source address
#[derive(Debug)]
pub struct AdmissionLimiter {
    /// Admissions counted in the current window
    counts: Mutex<HashMap<IpAddr, usize>>,
    /// Maximum number of admissions allowed per address in the window
    max_admissions: usize,
    /// Time window for rate limiting
    window: Duration,
}

impl AdmissionLimiter {
    /// Create a new admission limiter
    ///
    /// # Arguments
    ///
    /// * `max_admissions` - Admissions allowed per address in each window
    /// * `window` - Window length; counters reset when it elapses
    ///
    /// # Example
    ///
    /// ```
    /// use enclose_server::api::rate_limiter::AdmissionLimiter;
    /// use std::time::Duration;
    ///
    /// // Allow 100 connections per minute from each address
    /// let limiter = AdmissionLimiter::new(100, Duration::from_secs(60));
    /// ```
    pub fn new(max_admissions: usize, window: Duration) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_admissions,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_admissions, config.window)
    }

    /// Count an admission from `ip`
    ///
    /// Returns `true` if the admission is allowed, `false` if the address has
    /// used up its allowance for this window.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(ip).or_insert(0);
        if *count >= self.max_admissions {
            return false;
        }
        *count += 1;
        true
    }

    /// Clear every counter at once
    pub async fn reset(&self) {
        self.counts.lock().await.clear();
    }

    /// Reset all counters every `window` until the limiter is dropped.
    pub fn spawn_reset_task(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let window = self.window;

        tokio::spawn(async move {
            let mut ticker = interval(window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else { break };
                limiter.reset().await;
            }
        })
    }
}

impl Default for AdmissionLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
    const OTHER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 7));

    #[tokio::test]
    async fn test_allows_within_limit() {
        let limiter = AdmissionLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(limiter.check(LOCAL).await, "Should allow admissions within limit");
        }
        assert!(!limiter.check(LOCAL).await, "Should block admission over limit");
    }

    #[tokio::test]
    async fn test_addresses_counted_separately() {
        let limiter = AdmissionLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check(LOCAL).await);
        assert!(!limiter.check(LOCAL).await);
        assert!(limiter.check(OTHER).await);
        assert!(!limiter.check(OTHER).await);
    }

    #[tokio::test]
    async fn test_reset_clears_all_counters() {
        let limiter = AdmissionLimiter::new(2, Duration::from_secs(60));

        limiter.check(LOCAL).await;
        limiter.check(LOCAL).await;
        limiter.check(OTHER).await;
        assert!(!limiter.check(LOCAL).await);

        limiter.reset().await;
        assert!(limiter.check(LOCAL).await);
        assert!(limiter.check(LOCAL).await);
        assert!(limiter.check(OTHER).await);
        assert!(limiter.check(OTHER).await);
    }

    #[tokio::test]
    async fn test_default_limit() {
        let limiter = AdmissionLimiter::default();

        for _ in 0..100 {
            assert!(limiter.check(LOCAL).await);
        }
        assert!(!limiter.check(LOCAL).await, "Should block the 101st admission");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapses() {
        let limiter = Arc::new(AdmissionLimiter::new(1, Duration::from_secs(60)));
        let _task = limiter.spawn_reset_task();

        assert!(limiter.check(LOCAL).await);
        assert!(!limiter.check(LOCAL).await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(limiter.check(LOCAL).await, "Should allow after the window resets");
    }
}
