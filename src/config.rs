//! Configuration for the resolution core
//!
//! Retry and polling parameters are configuration, not constants. Defaults
//! here are the documented baseline; environment variables override them for
//! deployments that need different pacing.

use std::time::Duration;

/// Tuning knobs for the gateway, resolver, and poller.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Per-request timeout for remote fetches (default: 12 s)
    pub gateway_timeout: Duration,
    /// Max automatic retries for transient failures on idempotent reads
    /// (default: 2)
    pub gateway_max_retries: u32,
    /// Base delay before the first retry, doubling per attempt
    /// (default: 250 ms)
    pub gateway_retry_base: Duration,
    /// Cap on any single backoff delay (default: 2 s)
    pub gateway_retry_cap: Duration,

    /// Delay between reconciliation poll attempts (default: 300 ms)
    pub poll_interval: Duration,
    /// Max poll attempts before giving up on a key (default: 5)
    pub poll_max_attempts: u32,

    /// Bearer token injected on gateway requests, if the API variant
    /// requires one
    pub api_token: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(12),
            gateway_max_retries: 2,
            gateway_retry_base: Duration::from_millis(250),
            gateway_retry_cap: Duration::from_secs(2),

            poll_interval: Duration::from_millis(300),
            poll_max_attempts: 5,

            api_token: None,
        }
    }
}

impl CoreConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GATEWAY_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.gateway_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_MAX_RETRIES") {
            if let Ok(n) = val.parse::<u32>() {
                config.gateway_max_retries = n;
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_RETRY_BASE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.gateway_retry_base = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("GATEWAY_RETRY_CAP_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.gateway_retry_cap = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("POLL_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.poll_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("POLL_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse::<u32>() {
                config.poll_max_attempts = n;
            }
        }

        if let Ok(token) = std::env::var("CONTENT_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        config
    }

    /// Backoff delay before retry attempt `attempt` (1-based), doubling from
    /// the base and capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.gateway_retry_base
            .saturating_mul(factor)
            .min(self.gateway_retry_cap)
    }
}
