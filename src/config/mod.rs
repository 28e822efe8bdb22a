//! # Scheduler Configuration System
//!
//! Configuration is passed to the scheduler as in-memory value structs. The same structs
//! can be loaded from YAML through [`ConfigManager`], which layers an optional
//! environment-specific overlay file on top of a base file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_scheduler::config::{ConfigManager, SchedulerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults are valid on their own
//! let config = SchedulerConfig::default();
//! config.validate()?;
//!
//! // Or load scheduler.yaml (+ scheduler.<env>.yaml) from a directory
//! let manager = ConfigManager::load_from_directory_with_env("config", "test")?;
//! let workers = manager.config().worker_pool.workers;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;
use crate::resilience::{BulkheadConfig, CircuitBreakerConfig, RetryConfig};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{detect_environment, ConfigManager};

/// Root configuration of an enhanced scheduler
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker pool sizing
    pub worker_pool: WorkerPoolConfig,

    /// Default retry policy for enhanced tasks without their own
    pub retry: RetryConfig,

    /// Shared circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,

    /// Shared bulkhead settings
    pub bulkhead: BulkheadConfig,

    /// Per-task execution defaults
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: constants::worker_pool::DEFAULT_WORKERS,
        }
    }
}

impl WorkerPoolConfig {
    /// Capacity of both the task queue and the result channel
    pub fn channel_capacity(&self) -> usize {
        self.workers * constants::worker_pool::CHANNEL_CAPACITY_MULTIPLIER
    }
}

/// Task execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Timeout applied to enhanced tasks that don't set one. `None` means no deadline.
    #[serde(rename = "default_task_timeout_ms", with = "option_duration_ms")]
    pub default_task_timeout: Option<Duration>,
    /// Retry count used when an enhanced task sets neither a policy nor a count
    pub default_max_retries: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_task_timeout: None,
            default_max_retries: constants::retry::FALLBACK_MAX_RETRIES,
        }
    }
}

impl SchedulerConfig {
    /// Validate all sections, reporting the first offending field
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_pool.workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_pool.workers",
                "0",
                "max workers must be >= 1",
            ));
        }
        if self.bulkhead.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "bulkhead.capacity",
                "0",
                "bulkhead capacity must be >= 1",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                "0",
                "failure threshold must be >= 1",
            ));
        }
        self.retry.validate()?;
        if self.execution.default_task_timeout == Some(Duration::ZERO) {
            return Err(ConfigurationError::invalid_value(
                "execution.default_task_timeout_ms",
                "0",
                "timeout must be positive",
            ));
        }
        Ok(())
    }
}

impl RetryConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_factor",
                self.backoff_factor.to_string(),
                "backoff factor must be >= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigurationError::invalid_value(
                "retry.jitter_factor",
                self.jitter_factor.to_string(),
                "jitter factor must be within [0, 1]",
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigurationError::invalid_value(
                "retry.initial_delay_ms",
                self.initial_delay.as_millis().to_string(),
                "initial delay must not exceed max delay",
            ));
        }
        Ok(())
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde adapter storing an optional `Duration` as integer milliseconds
pub mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
