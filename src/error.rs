use crate::config::ConfigurationError;

/// Errors surfaced by the scheduler, the worker pool and the resilience layer.
///
/// Cancellation is a single variant distinguished by its message ("context canceled",
/// "context deadline exceeded", "cancelled during backoff: ...").
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("task with ID {0} already exists")]
    DuplicateTask(String),

    #[error("dependency {dependency} not found for task {task_id}")]
    DependencyNotFound { task_id: String, dependency: String },

    #[error("dependency cycle detected at task {0}")]
    CycleDetected(String),

    #[error("task {task_id} failed: {cause}")]
    TaskFailed {
        task_id: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("non-retryable error on attempt {attempt}: {cause}")]
    NonRetryable {
        attempt: u32,
        #[source]
        cause: anyhow::Error,
    },

    #[error("operation failed after {attempts} attempts: {cause}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        cause: anyhow::Error,
    },

    #[error("{0}")]
    Cancelled(String),

    #[error("circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    #[error("bulkhead capacity exceeded (capacity {capacity})")]
    BulkheadFull { capacity: usize },

    #[error("worker pool is not running")]
    PoolNotRunning,

    #[error("worker pool is shutting down")]
    PoolShuttingDown,

    #[error("worker pool task queue is full")]
    QueueFull,

    #[error(transparent)]
    Operation(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl OrchestrationError {
    /// True for context cancellation and deadline errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestrationError::Cancelled(_))
    }

    /// True for fast-fail rejections that did not run the operation and may succeed later.
    pub fn is_retryable_rejection(&self) -> bool {
        matches!(
            self,
            OrchestrationError::CircuitOpen { .. }
                | OrchestrationError::BulkheadFull { .. }
                | OrchestrationError::QueueFull
        )
    }

    pub(crate) fn context_canceled() -> Self {
        OrchestrationError::Cancelled("context canceled".to_string())
    }

    pub(crate) fn deadline_exceeded() -> Self {
        OrchestrationError::Cancelled("context deadline exceeded".to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
