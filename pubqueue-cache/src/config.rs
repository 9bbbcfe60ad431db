//! Cache configuration.

use std::time::Duration;

use pubqueue_core::{ConfigError, PubQueueResult};

/// Configuration for [`PubQueueCache`](crate::PubQueueCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a query waits for the head poller before giving up.
    pub max_fetch_wait: Duration,
    /// Upper bound on joining the tail task during `close()`.
    pub close_timeout: Duration,
    /// Whether agent queues are announced to the queue registry.
    pub register_queues: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_fetch_wait: Duration::from_secs(60), // 1 minute
            close_timeout: Duration::from_secs(5),
            register_queues: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the head poller wait bound.
    pub fn with_max_fetch_wait(mut self, duration: Duration) -> Self {
        self.max_fetch_wait = duration;
        self
    }

    /// Set the tail task join bound used by `close()`.
    pub fn with_close_timeout(mut self, duration: Duration) -> Self {
        self.close_timeout = duration;
        self
    }

    /// Enable or disable queue registration.
    pub fn with_register_queues(mut self, enabled: bool) -> Self {
        self.register_queues = enabled;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `PUBQUEUE_MAX_FETCH_WAIT_MS`: head poller wait bound (default: 60000)
    /// - `PUBQUEUE_CLOSE_TIMEOUT_MS`: tail join bound on close (default: 5000)
    /// - `PUBQUEUE_REGISTER_QUEUES`: `true` (any case) or `1` to register queues (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_fetch_wait: std::env::var("PUBQUEUE_MAX_FETCH_WAIT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_fetch_wait),
            close_timeout: std::env::var("PUBQUEUE_CLOSE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.close_timeout),
            register_queues: std::env::var("PUBQUEUE_REGISTER_QUEUES")
                .map(|s| s.trim().eq_ignore_ascii_case("true") || s.trim() == "1")
                .unwrap_or(defaults.register_queues),
        }
    }

    /// Validate the configuration.
    ///
    /// Both durations must be positive.
    pub fn validate(&self) -> PubQueueResult<()> {
        if self.max_fetch_wait.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "max_fetch_wait".to_string(),
                value: format!("{:?}", self.max_fetch_wait),
                reason: "max_fetch_wait must be positive".to_string(),
            }
            .into());
        }

        if self.close_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "close_timeout".to_string(),
                value: format!("{:?}", self.close_timeout),
                reason: "close_timeout must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
