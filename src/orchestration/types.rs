//! # Orchestration Types
//!
//! Tasks, resilience-enhanced tasks, and per-task results.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::duration_ms;
use crate::resilience::RetryConfig;

pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A zero-argument operation; each call starts a fresh execution
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// A named unit of work with optional dependencies
#[derive(Clone)]
pub struct Task {
    pub id: String,
    pub execute: TaskFn,
    pub depends_on: Vec<String>,
}

impl Task {
    pub fn new<F, Fut>(id: impl Into<String>, execute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            execute: Arc::new(move || -> TaskFuture { Box::pin(execute()) }),
            depends_on: Vec::new(),
        }
    }

    pub fn from_fn(id: impl Into<String>, execute: TaskFn) -> Self {
        Self {
            id: id.into(),
            execute,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Start one execution of the task
    pub fn run(&self) -> TaskFuture {
        (self.execute)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// A task with resilience settings, compiled into a plain [`Task`] at registration
#[derive(Debug, Clone)]
pub struct EnhancedTask {
    pub task: Task,
    /// Own retry policy; `None` or `max_attempts == 0` uses the scheduler default
    pub retry_config: Option<RetryConfig>,
    /// Attempt budget applied to the scheduler default; 0 falls back to the configured
    /// default retry count
    pub max_retries: u32,
    /// Carried for callers; execution order never depends on it
    pub priority: i32,
    /// Per-execution deadline; `None` uses the scheduler's default task timeout
    pub timeout: Option<Duration>,
    pub requires_circuit_breaker: bool,
}

impl EnhancedTask {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            retry_config: None,
            max_retries: 0,
            priority: 0,
            timeout: None,
            requires_circuit_breaker: false,
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_circuit_breaker(mut self) -> Self {
        self.requires_circuit_breaker = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.task.id
    }

    /// The task's own retry policy when it actually sets an attempt budget
    pub(crate) fn own_retry_config(&self) -> Option<RetryConfig> {
        self.retry_config
            .as_ref()
            .filter(|config| config.max_attempts != 0)
            .cloned()
    }
}

impl From<Task> for EnhancedTask {
    fn from(task: Task) -> Self {
        EnhancedTask::new(task)
    }
}

/// Outcome of one task's whole attempt sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempts: u32,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn from_outcome(
        task_id: impl Into<String>,
        outcome: &anyhow::Result<()>,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|error| error.to_string()),
            attempts,
            duration,
            completed_at: Utc::now(),
        }
    }
}
