//! Resilience policy values

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_ms;
use crate::constants;

/// Retry policy: exponential backoff with jitter.
///
/// `retryable_errors` holds the string forms of errors that may be retried. Matching is
/// exact string equality against the error's `Display` output; an empty list makes every
/// error retryable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::DEFAULT_MAX_ATTEMPTS,
            initial_delay: constants::retry::DEFAULT_INITIAL_DELAY,
            max_delay: constants::retry::DEFAULT_MAX_DELAY,
            backoff_factor: constants::retry::DEFAULT_BACKOFF_FACTOR,
            jitter_factor: constants::retry::DEFAULT_JITTER_FACTOR,
            retryable_errors: Vec::new(),
        }
    }
}

impl RetryConfig {
    /// Same policy with a different attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Policy used by `Scheduler::execute_with_retry`
    pub fn scheduler_default(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: constants::retry::SCHEDULER_INITIAL_DELAY,
            max_delay: constants::retry::SCHEDULER_MAX_DELAY,
            backoff_factor: constants::retry::SCHEDULER_BACKOFF_FACTOR,
            jitter_factor: 0.0,
            retryable_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    #[serde(rename = "reset_timeout_ms", with = "duration_ms")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::circuit_breaker::DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: constants::circuit_breaker::DEFAULT_RESET_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadConfig {
    pub capacity: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            capacity: constants::bulkhead::DEFAULT_CAPACITY,
        }
    }
}
