//! # Enhanced Scheduler
//!
//! Scheduler whose tasks run behind the resilience layer and, in async mode, on a
//! long-lived [`WorkerPool`].
//!
//! An [`EnhancedTask`] is compiled into a plain [`Task`] when it is registered. Each run
//! of the compiled task:
//!
//! 1. picks the retry policy: the task's own, else the scheduler's current default with
//!    the task's retry count;
//! 2. derives a context from the scheduler's root context, with the task timeout (or the
//!    configured default) as deadline;
//! 3. runs `Bulkhead → CircuitBreaker (optional) → Retry → task`.
//!
//! Policies are read through [`ResiliencePolicies`] on every run, so replacing one
//! applies to every registered task from its next run on.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::constants;
use crate::context::ExecutionContext;
use crate::error::{OrchestrationError, Result};
use crate::logging::log_task_operation;
use crate::orchestration::registry::{ExecutionStrategy, TaskRegistry};
use crate::orchestration::types::{EnhancedTask, Task, TaskFn, TaskFuture, TaskResult};
use crate::orchestration::worker_pool::{WorkerPool, WorkerPoolStats};
use crate::resilience::{
    CircuitBreakerConfig, CircuitState, ResiliencePolicies, RetryConfig, RetryExecutor,
};

/// Snapshot returned by [`EnhancedScheduler::get_stats`]
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub worker_pool: WorkerPoolStats,
    pub circuit_breaker_state: CircuitState,
    pub bulkhead_concurrency: usize,
    pub bulkhead_capacity: usize,
}

#[derive(Debug)]
pub struct EnhancedScheduler {
    config: SchedulerConfig,
    registry: TaskRegistry,
    policies: Arc<ResiliencePolicies>,
    worker_pool: WorkerPool,
    root: ExecutionContext,
}

/// Everything a compiled task needs at execution time
#[derive(Clone)]
struct CompiledTask {
    inner: Task,
    own_retry: Option<RetryConfig>,
    max_retries: u32,
    timeout: Option<Duration>,
    requires_circuit_breaker: bool,
    policies: Arc<ResiliencePolicies>,
    root: ExecutionContext,
}

impl CompiledTask {
    fn retry_config(&self) -> RetryConfig {
        if let Some(config) = &self.own_retry {
            return config.clone();
        }
        let attempts = if self.max_retries != 0 {
            self.max_retries
        } else {
            constants::retry::FALLBACK_MAX_RETRIES
        };
        self.policies.retry_config().with_max_attempts(attempts)
    }

    fn context(&self) -> ExecutionContext {
        match self.timeout {
            Some(timeout) => self.root.with_timeout(timeout),
            None => self.root.child(),
        }
    }

    async fn execute(self) -> anyhow::Result<()> {
        let retry = RetryExecutor::new(self.retry_config());
        let ctx = self.context();
        let bulkhead = self.policies.bulkhead();
        let task = &self.inner;

        let outcome = if self.requires_circuit_breaker {
            let breaker = self.policies.circuit_breaker();
            bulkhead
                .execute(&ctx, || {
                    breaker.call(|| retry.execute(&ctx, || task.run()))
                })
                .await
        } else {
            bulkhead
                .execute(&ctx, || retry.execute(&ctx, || task.run()))
                .await
        };

        if let Err(e) = &outcome {
            debug!(task_id = %task.id, error = %e, "Enhanced task execution failed");
        }
        outcome.map_err(anyhow::Error::from)
    }
}

impl EnhancedScheduler {
    /// Build a scheduler from a validated configuration
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let root = ExecutionContext::background();
        let worker_pool = WorkerPool::with_context(config.worker_pool.workers, &root);
        let policies = Arc::new(ResiliencePolicies::new(
            config.retry.clone(),
            config.circuit_breaker.clone(),
            config.bulkhead.clone(),
        ));

        info!(
            "🎯 ENHANCED_SCHEDULER: Created with {} workers, bulkhead capacity {}, breaker threshold {}",
            config.worker_pool.workers,
            config.bulkhead.capacity,
            config.circuit_breaker.failure_threshold
        );

        Ok(Self {
            config,
            registry: TaskRegistry::new(),
            policies,
            worker_pool,
            root,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(SchedulerConfig::default())
    }

    /// Register a plain task; it runs without the resilience layer
    pub fn add_task(&self, task: Task) -> Result<()> {
        self.registry.register(task)
    }

    /// Register a task wrapped in the bulkhead, the optional breaker and retry
    pub fn add_enhanced_task(&self, task: EnhancedTask) -> Result<()> {
        let max_retries = if task.max_retries != 0 {
            task.max_retries
        } else {
            self.config.execution.default_max_retries
        };

        let compiled = CompiledTask {
            own_retry: task.own_retry_config(),
            max_retries,
            timeout: task.timeout.or(self.config.execution.default_task_timeout),
            requires_circuit_breaker: task.requires_circuit_breaker,
            policies: self.policies.clone(),
            root: self.root.clone(),
            inner: task.task,
        };

        debug!(
            task_id = %compiled.inner.id,
            priority = task.priority,
            circuit_breaker = compiled.requires_circuit_breaker,
            timeout_ms = compiled.timeout.map(|t| t.as_millis() as u64),
            "Compiled enhanced task"
        );

        let id = compiled.inner.id.clone();
        let depends_on = compiled.inner.depends_on.clone();
        let execute: TaskFn = Arc::new(move || -> TaskFuture { Box::pin(compiled.clone().execute()) });

        self.registry.register(Task {
            id,
            execute,
            depends_on,
        })
    }

    /// Submit every task to the worker pool, ignoring dependencies, and wait for all
    /// results.
    ///
    /// Task failures are recorded and logged but do not fail the call. If the root
    /// context is cancelled, the cancellation error is returned at once and outstanding
    /// results are abandoned.
    pub async fn run_async(&self) -> Result<Vec<TaskResult>> {
        self.worker_pool.start()?;

        let tasks = self.registry.tasks();
        let expected = tasks.len();
        let dropped_before = self.worker_pool.dropped_results();
        let mut results = Vec::with_capacity(expected);
        let mut recorded = 0;

        info!(
            "🚀 ENHANCED_SCHEDULER: Submitting {} tasks to worker pool {}",
            expected,
            self.worker_pool.pool_id()
        );

        for task in tasks {
            tokio::select! {
                biased;
                _ = self.root.done() => return Err(self.cancellation_error()),
                submitted = self.worker_pool.submit_with_backpressure(task, &mut results) => submitted?,
            }
            recorded = self.record_results(&results, recorded);
        }

        loop {
            let dropped = (self.worker_pool.dropped_results() - dropped_before) as usize;
            if results.len() + dropped >= expected {
                break;
            }

            tokio::select! {
                biased;
                _ = self.root.done() => return Err(self.cancellation_error()),
                received = self.worker_pool.recv_result() => match received {
                    Some(result) => results.push(result),
                    None => break,
                },
                _ = tokio::time::sleep(constants::worker_pool::RESULT_POLL_INTERVAL) => {}
            }
            recorded = self.record_results(&results, recorded);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            "✅ ENHANCED_SCHEDULER: Collected {} results ({} failed)",
            results.len(),
            failed
        );
        Ok(results)
    }

    fn record_results(&self, results: &[TaskResult], recorded: usize) -> usize {
        for result in &results[recorded..] {
            self.registry.record_outcome(&result.task_id, result.success);
            if !result.success {
                log_task_operation(
                    "run_async",
                    &result.task_id,
                    "failed",
                    Some(result.attempts),
                    result.error.as_deref(),
                );
            }
        }
        results.len()
    }

    fn cancellation_error(&self) -> OrchestrationError {
        self.root
            .err()
            .unwrap_or_else(OrchestrationError::context_canceled)
    }

    /// Dependency-ordered, fail-fast execution of the compiled tasks
    pub async fn run_sequential(&self) -> Result<()> {
        self.registry.run_all(&ExecutionStrategy::Direct).await
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let bulkhead = self.policies.bulkhead();
        SchedulerStats {
            total_tasks: self.registry.len(),
            completed_tasks: self.registry.completed_count(),
            worker_pool: self.worker_pool.stats(),
            circuit_breaker_state: self.policies.circuit_breaker().state(),
            bulkhead_concurrency: bulkhead.current_concurrency(),
            bulkhead_capacity: bulkhead.capacity(),
        }
    }

    /// Replace the default retry policy used by tasks without their own
    pub fn set_retry_config(&self, config: RetryConfig) {
        self.policies.set_retry_config(config);
    }

    /// Replace the shared circuit breaker with a closed one using `config`
    pub fn set_circuit_breaker_config(&self, config: CircuitBreakerConfig) {
        info!(
            "🔧 ENHANCED_SCHEDULER: Circuit breaker replaced (threshold {}, reset {:?})",
            config.failure_threshold, config.reset_timeout
        );
        self.policies.set_circuit_breaker_config(config);
    }

    /// Replace the shared bulkhead with an empty one of `capacity` slots (at least 1)
    pub fn set_bulkhead_capacity(&self, capacity: usize) {
        self.policies.set_bulkhead_capacity(capacity);
    }

    /// Cancel the root context and stop the worker pool
    pub async fn shutdown(&self) {
        info!("🛑 ENHANCED_SCHEDULER: Shutting down");
        self.root.cancel();
        self.worker_pool.stop().await;
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.registry.is_completed(task_id)
    }

    pub fn task_count(&self) -> usize {
        self.registry.len()
    }

    pub fn root_context(&self) -> &ExecutionContext {
        &self.root
    }

    pub fn policies(&self) -> &Arc<ResiliencePolicies> {
        &self.policies
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
