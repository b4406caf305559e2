use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Conflict retry
    // =========================
    /// Maximum admission attempts per request when the storage layer keeps
    /// reporting lost races. Bounds how long a caller can be held up by a
    /// burst of concurrent bookings for the same key.
    pub retry_max_attempts: u32,

    /// Fixed pause between attempts, in milliseconds. Long enough for the
    /// winning commit to become visible to the re-read, short enough that
    /// an interactive caller doesn't notice.
    pub retry_backoff_ms: u64,

    // =========================
    // Change fan-out
    // =========================
    /// Buffered events per subscriber of the change feed. Slow subscribers
    /// that fall further behind are told to resync instead of growing the
    /// buffer.
    pub notifier_capacity: usize,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://reserva_dev.db".to_string());

        Self {
            database_url,
            retry_max_attempts: 3,
            retry_backoff_ms: 500,
            notifier_capacity: 64,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_defaults_are_usable() {
        let cfg = EngineConfig::from_env();

        assert!(!cfg.database_url.is_empty());
        assert_eq!(cfg.retry_max_attempts, 3);
        assert!(cfg.notifier_capacity > 0);
    }

    #[test]
    fn retry_policy_maps_the_backoff() {
        let cfg = EngineConfig {
            database_url: "sqlite://test.db".into(),
            retry_max_attempts: 5,
            retry_backoff_ms: 250,
            notifier_capacity: 8,
        };

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }
}
