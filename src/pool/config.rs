//! Configuration for the worker pool.

use crate::core::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`WorkerPool`](super::WorkerPool)
///
/// Durations are (de)serialized as whole milliseconds.
///
/// # Example
///
/// ```rust
/// use rust_work_queue::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new(10)
///     .with_queue_capacity(100)
///     .with_job_timeout(Duration::from_secs(10))
///     .with_thread_name_prefix("conn-worker");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads (0 = number of CPUs)
    pub num_workers: usize,
    /// Capacity of the job queue built by [`WorkerPool::with_config`](super::WorkerPool::with_config)
    pub queue_capacity: usize,
    /// Time budget each accepted job gets, from acceptance to deadline
    #[serde(with = "millis")]
    pub job_timeout: Duration,
    /// How long a shutdown waits for the queue to drain
    #[serde(with = "millis")]
    pub shutdown_timeout: Duration,
    /// How long the dispatcher idles when its source has nothing ready
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Thread name prefix; workers are named `{prefix}-{id}`
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            queue_capacity: 100,
            job_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            thread_name_prefix: "worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with the given number of workers
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: if num_workers == 0 {
                num_cpus::get()
            } else {
                num_workers
            },
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the JSON is malformed or the
    /// resulting configuration fails [`validate()`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: PoolConfig = serde_json::from_str(json)
            .map_err(|e| PoolError::invalid_config("json", e.to_string()))?;
        if config.num_workers == 0 {
            config.num_workers = num_cpus::get();
        }
        config.validate()?;
        Ok(config)
    }

    /// Set queue capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the per-job time budget
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set the default shutdown budget
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the dispatcher idle poll interval
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        self.poll_interval = interval;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(PoolError::invalid_config(
                "num_workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::invalid_config(
                "queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(PoolError::invalid_config(
                "job_timeout",
                "Job timeout must be non-zero",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::invalid_config(
                "poll_interval",
                "Poll interval must be non-zero",
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.job_timeout, Duration::from_secs(10));
        assert!(config.num_workers > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_means_cpu_count() {
        assert_eq!(PoolConfig::new(0).num_workers, num_cpus::get());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = PoolConfig::new(2).with_queue_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig { parameter, .. }) if parameter == "queue_capacity"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_job_timeout() {
        let config = PoolConfig::new(2).with_job_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PoolConfig::from_json_str(
            r#"{ "num_workers": 10, "job_timeout": 2500, "thread_name_prefix": "conn" }"#,
        )
        .unwrap();
        assert_eq!(config.num_workers, 10);
        assert_eq!(config.job_timeout, Duration::from_millis(2500));
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.thread_name_prefix, "conn");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(PoolConfig::from_json_str("{ not json").is_err());
        assert!(PoolConfig::from_json_str(r#"{ "queue_capacity": 0 }"#).is_err());
    }

    #[test]
    fn test_json_round_trip_uses_millis() {
        let config = PoolConfig::new(3).with_shutdown_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["shutdown_timeout"], 1500);
    }

    #[test]
    #[should_panic(expected = "poll interval must be non-zero")]
    fn test_zero_poll_interval_panics() {
        let _ = PoolConfig::new(1).with_poll_interval(Duration::ZERO);
    }
}
