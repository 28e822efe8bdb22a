//! # Task Registry
//!
//! Tasks keyed by ID plus the completion map, behind one coarse lock. Task bodies always
//! run with the lock released.
//!
//! Dependency resolution is a depth-first traversal in registration order with memoized
//! completion. Tasks that already completed are skipped, and the first failure aborts
//! the traversal. Each traversal tracks the tasks it is currently visiting, so a
//! dependency cycle is reported as [`OrchestrationError::CycleDetected`].

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{OrchestrationError, Result};
use crate::logging::log_error;
use crate::orchestration::types::Task;
use crate::resilience::{RetryConfig, RetryExecutor};

/// How the traversal invokes each task
#[derive(Debug, Clone)]
pub enum ExecutionStrategy {
    /// Call the task's execute once
    Direct,
    /// Wrap each call in a retry executor
    WithRetry(RetryConfig),
}

#[derive(Debug, Default)]
struct RegistryState {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    completed: HashMap<String, bool>,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; an existing ID is never overwritten
    pub fn register(&self, task: Task) -> Result<()> {
        let mut state = self.state.write();
        if state.tasks.contains_key(&task.id) {
            return Err(OrchestrationError::DuplicateTask(task.id));
        }
        debug!(task_id = %task.id, depends_on = ?task.depends_on, "Task registered");
        state.order.push(task.id.clone());
        state.completed.insert(task.id.clone(), false);
        state.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.state.read().tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().tasks.contains_key(id)
    }

    /// All tasks in registration order
    pub fn tasks(&self) -> Vec<Task> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.state.read().completed.get(id).copied().unwrap_or(false)
    }

    pub fn completed_count(&self) -> usize {
        self.state
            .read()
            .completed
            .values()
            .filter(|done| **done)
            .count()
    }

    /// Snapshot of the completion map
    pub fn completion_snapshot(&self) -> HashMap<String, bool> {
        self.state.read().completed.clone()
    }

    /// Record an outcome; a completed task is never reset
    pub fn record_outcome(&self, id: &str, success: bool) {
        let mut state = self.state.write();
        let entry = state.completed.entry(id.to_string()).or_insert(false);
        *entry = *entry || success;
    }

    /// Run every registered task after its dependencies, failing fast
    pub async fn run_all(&self, strategy: &ExecutionStrategy) -> Result<()> {
        let started = Instant::now();
        let ids = self.task_ids();
        info!(task_count = ids.len(), "🚀 Starting dependency-ordered execution");

        let ctx = ExecutionContext::background();
        let mut visiting = HashSet::new();
        for id in &ids {
            if let Err(e) = self.visit(id, &mut visiting, strategy, &ctx).await {
                log_error("task_registry", "run_all", &e.to_string(), Some(id));
                return Err(e);
            }
        }

        info!(
            task_count = ids.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "✅ Dependency-ordered execution completed"
        );
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        visiting: &'a mut HashSet<String>,
        strategy: &'a ExecutionStrategy,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.is_completed(id) {
                return Ok(());
            }
            if !visiting.insert(id.to_string()) {
                return Err(OrchestrationError::CycleDetected(id.to_string()));
            }

            // The caller checked that `id` exists; a concurrently missing task is a
            // missing dependency of itself.
            let task = self
                .get(id)
                .ok_or_else(|| OrchestrationError::DependencyNotFound {
                    task_id: id.to_string(),
                    dependency: id.to_string(),
                })?;

            for dependency in &task.depends_on {
                if !self.contains(dependency) {
                    return Err(OrchestrationError::DependencyNotFound {
                        task_id: task.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
                self.visit(dependency, visiting, strategy, ctx).await?;
            }

            // A shared dependency may have completed through another path meanwhile
            if !self.is_completed(id) {
                debug!(task_id = %id, "Executing task");
                Self::execute(&task, strategy, ctx)
                    .await
                    .map_err(|cause| OrchestrationError::TaskFailed {
                        task_id: task.id.clone(),
                        cause,
                    })?;
                self.record_outcome(id, true);
                debug!(task_id = %id, "Task completed");
            }

            visiting.remove(id);
            Ok(())
        })
    }

    async fn execute(
        task: &Task,
        strategy: &ExecutionStrategy,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<()> {
        match strategy {
            ExecutionStrategy::Direct => task.run().await,
            ExecutionStrategy::WithRetry(config) => {
                let retry = RetryExecutor::new(config.clone());
                retry
                    .execute(ctx, || task.run())
                    .await
                    .map_err(anyhow::Error::from)
            }
        }
    }
}
