//! # Scheduler
//!
//! Dependency-aware task scheduler over plain [`Task`]s.
//!
//! ## Execution Modes
//!
//! - **Sequential** (`run`, `execute_sequential`): depth-first in registration order,
//!   dependencies first, fail-fast.
//! - **With retry** (`execute_with_retry`): sequential, with each task wrapped in a
//!   fixed exponential-backoff retry policy.
//! - **Concurrent** (`execute_concurrent`): every task goes through a disposable
//!   [`WorkerPool`]. Dependencies are ignored; this mode assumes independent tasks.
//! - **Autonomous** (`execute_autonomous`): every task on its own tokio task,
//!   dependencies ignored, nothing collected.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Result;
use crate::logging::log_task_operation;
use crate::orchestration::registry::{ExecutionStrategy, TaskRegistry};
use crate::orchestration::types::{Task, TaskResult};
use crate::orchestration::worker_pool::WorkerPool;
use crate::resilience::RetryConfig;

#[derive(Debug, Default)]
pub struct Scheduler {
    registry: TaskRegistry,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Fails with `DuplicateTask` if the ID is taken.
    pub fn add_task(&self, task: Task) -> Result<()> {
        self.registry.register(task)
    }

    /// Run all tasks, dependencies first, stopping at the first failure
    pub async fn run(&self) -> Result<()> {
        self.registry.run_all(&ExecutionStrategy::Direct).await
    }

    pub async fn execute_sequential(&self) -> Result<()> {
        self.run().await
    }

    /// Like [`Scheduler::run`], retrying each task up to `max_retries` attempts with
    /// 100ms initial delay, doubling up to 5s
    pub async fn execute_with_retry(&self, max_retries: u32) -> Result<()> {
        let strategy = ExecutionStrategy::WithRetry(RetryConfig::scheduler_default(max_retries));
        self.registry.run_all(&strategy).await
    }

    /// Spawn every task at once, ignoring dependencies. Failures are only logged and
    /// completion state is left untouched. The handles may be awaited or dropped.
    pub fn execute_autonomous(&self) -> Vec<JoinHandle<()>> {
        let tasks = self.registry.tasks();
        info!(task_count = tasks.len(), "🚀 Launching autonomous tasks");

        tasks
            .into_iter()
            .map(|task| {
                tokio::spawn(async move {
                    if let Err(e) = task.run().await {
                        warn!(task_id = %task.id, error = %e, "Autonomous task failed");
                    }
                })
            })
            .collect()
    }

    /// Run every task through a temporary pool of `workers` workers, ignoring
    /// dependencies, and collect one result per task that reported.
    ///
    /// Successful tasks are marked completed; failures are logged and recorded as not
    /// completed. Only pool failures are returned as errors.
    pub async fn execute_concurrent(&self, workers: usize) -> Result<Vec<TaskResult>> {
        let tasks = self.registry.tasks();
        let pool = WorkerPool::new(workers);
        pool.start()?;

        info!(
            task_count = tasks.len(),
            workers = pool.workers(),
            "🚀 Executing tasks concurrently"
        );

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Err(e) = pool.submit_with_backpressure(task, &mut results).await {
                pool.stop().await;
                return Err(e);
            }
        }

        pool.stop().await;
        while let Some(result) = pool.recv_result().await {
            results.push(result);
        }

        for result in &results {
            self.record_result(result);
        }
        Ok(results)
    }

    fn record_result(&self, result: &TaskResult) {
        self.registry.record_outcome(&result.task_id, result.success);
        if !result.success {
            log_task_operation(
                "execute_concurrent",
                &result.task_id,
                "failed",
                Some(result.attempts),
                result.error.as_deref(),
            );
        }
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.registry.is_completed(task_id)
    }

    pub fn completed_count(&self) -> usize {
        self.registry.completed_count()
    }

    pub fn task_count(&self) -> usize {
        self.registry.len()
    }

    /// Task IDs in registration order
    pub fn task_ids(&self) -> Vec<String> {
        self.registry.task_ids()
    }
}
