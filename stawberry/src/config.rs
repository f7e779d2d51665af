//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs.

use crate::common::error::CommonError;
use std::time::Duration;

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use stawberry::config::get_env_with_fallback;
///
/// let size = get_env_with_fallback("STAWBERRY_AUDIT_QUEUE_SIZE", "AUDIT_QUEUE_SIZE");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Audit pipeline configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Intake queue capacity; also the denominator of the eager-flush threshold.
    pub queue_size: usize,
    /// Number of sanitizing workers.
    pub worker_pool_size: usize,
    /// Initial buffer capacity. Buffers grow past it.
    pub batch_size: usize,
    /// Period of the timer-driven flush.
    pub flush_interval: Duration,
    /// Delay before the first retry of a failed sink write; doubles per retry.
    pub retry_base_delay: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            worker_pool_size: 4,
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            retry_base_delay: Duration::from_millis(250),
            max_retries: 3,
        }
    }
}

impl AuditConfig {
    /// Load audit configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let queue_size = get_env_with_fallback_parse(
            "STAWBERRY_AUDIT_QUEUE_SIZE",
            "AUDIT_QUEUE_SIZE",
            defaults.queue_size,
        );
        let worker_pool_size = get_env_with_fallback_parse(
            "STAWBERRY_AUDIT_WORKER_POOL",
            "AUDIT_WORKER_POOL",
            defaults.worker_pool_size,
        );
        let batch_size = get_env_with_fallback_parse(
            "STAWBERRY_AUDIT_BATCH_SIZE",
            "AUDIT_BATCH_SIZE",
            defaults.batch_size,
        );
        let flush_interval_secs = get_env_with_fallback_parse(
            "STAWBERRY_AUDIT_FLUSH_INTERVAL_SECS",
            "AUDIT_FLUSH_INTERVAL_SECS",
            defaults.flush_interval.as_secs(),
        );
        let retry_delay_ms = get_env_with_fallback_parse(
            "STAWBERRY_AUDIT_RETRY_DELAY_MS",
            "AUDIT_RETRY_DELAY_MS",
            defaults.retry_base_delay.as_millis() as u64,
        );

        Self {
            queue_size,
            worker_pool_size,
            batch_size,
            flush_interval: Duration::from_secs(flush_interval_secs),
            retry_base_delay: Duration::from_millis(retry_delay_ms),
            max_retries: defaults.max_retries,
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.queue_size == 0 {
            return Err(CommonError::Config("audit queue_size must be > 0".into()));
        }
        if self.worker_pool_size == 0 {
            return Err(CommonError::Config(
                "audit worker_pool_size must be > 0".into(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(CommonError::Config(
                "audit flush_interval must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Active buffer length above which a worker swaps instead of appending
    /// (90% of `queue_size`, truncated).
    pub fn eager_flush_threshold(&self) -> usize {
        self.queue_size * 9 / 10
    }
}
