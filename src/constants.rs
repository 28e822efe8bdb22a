//! # System Constants
//!
//! Defaults and fixed operational boundaries of the scheduler, the worker pool and the
//! resilience layer. Configuration values override the defaults; the fixed values are
//! part of the execution contract.

use std::time::Duration;

/// Worker pool sizing
pub mod worker_pool {
    use super::Duration;

    /// Default number of workers when none is configured
    pub const DEFAULT_WORKERS: usize = 4;
    /// Task queue and result channel capacity, as a multiple of the worker count
    pub const CHANNEL_CAPACITY_MULTIPLIER: usize = 2;
    /// How often a result collector re-checks for results the pool had to drop
    pub const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
}

/// Retry defaults
pub mod retry {
    use super::Duration;

    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
    pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

    /// Max retries applied to an enhanced task that configures neither a retry policy
    /// nor a retry count
    pub const FALLBACK_MAX_RETRIES: u32 = 3;

    /// Fixed policy of `Scheduler::execute_with_retry`
    pub const SCHEDULER_INITIAL_DELAY: Duration = Duration::from_millis(100);
    pub const SCHEDULER_MAX_DELAY: Duration = Duration::from_secs(5);
    pub const SCHEDULER_BACKOFF_FACTOR: f64 = 2.0;
}

/// Circuit breaker defaults
pub mod circuit_breaker {
    use super::Duration;

    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);
    /// Component name of the breaker shared by an enhanced scheduler
    pub const SCHEDULER_COMPONENT: &str = "enhanced_scheduler";
}

/// Bulkhead defaults
pub mod bulkhead {
    pub const DEFAULT_CAPACITY: usize = 10;
    pub const SCHEDULER_COMPONENT: &str = "enhanced_scheduler";
}

/// Environment detection
pub mod environment {
    pub const ENV_VAR: &str = "TASKER_ENV";
    pub const DEFAULT_ENVIRONMENT: &str = "development";
}

/// Log file output
pub mod logging {
    pub const LOG_DIR_ENV_VAR: &str = "TASKER_LOG_DIR";
    pub const DEFAULT_LOG_DIR: &str = "log";
}
