//! # Worker Pool
//!
//! A fixed set of tokio worker tasks consuming a bounded task channel and publishing a
//! [`TaskResult`] per task on a bounded result channel. Both channels hold twice as many
//! entries as there are workers.
//!
//! The pool knows nothing about retries or timeouts: a worker times one call of the
//! task's execute and reports it with `attempts = 1`. Resilience belongs to the task
//! itself (see `EnhancedScheduler::add_enhanced_task`). Each call runs on its own tokio
//! task, so a panicking body is reported as a failed result and the worker keeps going.
//!
//! ## Backpressure
//!
//! - `submit_task` never blocks; a full queue is reported as
//!   [`OrchestrationError::QueueFull`].
//! - Workers never block on a full result channel; the result is logged and dropped.
//!
//! ## Shutdown
//!
//! `stop()` closes the task channel, lets the workers drain what is already queued, waits
//! for them, and then closes the result channel. A stopped pool cannot be restarted.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants;
use crate::context::ExecutionContext;
use crate::error::{OrchestrationError, Result};
use crate::orchestration::types::{Task, TaskResult};

/// Point-in-time view of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolStats {
    pub pool_id: Uuid,
    pub workers: usize,
    pub running: bool,
    pub queue_capacity: usize,
    pub queued_tasks: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped_results: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug)]
struct PoolState {
    running: bool,
    stopped: bool,
    task_tx: Option<mpsc::Sender<Task>>,
    result_tx: Option<mpsc::Sender<TaskResult>>,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct WorkerPool {
    pool_id: Uuid,
    workers: usize,
    capacity: usize,
    state: parking_lot::Mutex<PoolState>,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    result_rx: tokio::sync::Mutex<mpsc::Receiver<TaskResult>>,
    context: ExecutionContext,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Create a pool with its own root context. A worker count of 0 is raised to 1.
    pub fn new(workers: usize) -> Self {
        Self::with_context(workers, &ExecutionContext::background())
    }

    /// Create a pool whose context is derived from `parent`; cancelling the parent puts
    /// the pool into the shutting-down state.
    pub fn with_context(workers: usize, parent: &ExecutionContext) -> Self {
        let workers = workers.max(1);
        let capacity = workers * constants::worker_pool::CHANNEL_CAPACITY_MULTIPLIER;
        let (task_tx, task_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);

        Self {
            pool_id: Uuid::new_v4(),
            workers,
            capacity,
            state: parking_lot::Mutex::new(PoolState {
                running: false,
                stopped: false,
                task_tx: Some(task_tx),
                result_tx: Some(result_tx),
                handles: Vec::with_capacity(workers),
            }),
            task_rx: Arc::new(tokio::sync::Mutex::new(task_rx)),
            result_rx: tokio::sync::Mutex::new(result_rx),
            context: parent.child(),
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Spawn the workers. Calling it on a running pool is a no-op; a stopped pool reports
    /// [`OrchestrationError::PoolNotRunning`]. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(OrchestrationError::PoolNotRunning);
        }
        if state.running {
            return Ok(());
        }
        let result_tx = state
            .result_tx
            .clone()
            .ok_or(OrchestrationError::PoolNotRunning)?;

        for worker_index in 0..self.workers {
            let handle = tokio::spawn(run_worker(
                worker_index,
                self.task_rx.clone(),
                result_tx.clone(),
                self.counters.clone(),
            ));
            state.handles.push(handle);
        }
        state.running = true;

        info!(
            "🏊 POOL: Worker pool {} started with {} workers (queue capacity {})",
            self.pool_id, self.workers, self.capacity
        );
        Ok(())
    }

    /// Stop accepting tasks, drain the queue and wait for every worker. Idempotent.
    pub async fn stop(&self) {
        let (handles, task_tx, result_tx) = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.running = false;
            state.stopped = true;
            (
                std::mem::take(&mut state.handles),
                state.task_tx.take(),
                state.result_tx.take(),
            )
        };

        info!("🛑 POOL: Stopping worker pool {}", self.pool_id);
        self.context.cancel();
        drop(task_tx);

        for handle in handles {
            if let Err(e) = handle.await {
                error!("❌ POOL: Worker in pool {} terminated abnormally: {}", self.pool_id, e);
            }
        }
        drop(result_tx);

        info!("✅ POOL: Worker pool {} stopped", self.pool_id);
    }

    /// Enqueue a task without waiting for room
    pub fn submit_task(&self, task: Task) -> Result<()> {
        let state = self.state.lock();
        if !state.running {
            return Err(OrchestrationError::PoolNotRunning);
        }
        if self.context.is_done() {
            return Err(OrchestrationError::PoolShuttingDown);
        }
        let sender = state
            .task_tx
            .as_ref()
            .ok_or(OrchestrationError::PoolNotRunning)?;

        match sender.try_send(task) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                debug!(task_id = %task.id, pool_id = %self.pool_id, "Task queue full");
                Err(OrchestrationError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(OrchestrationError::PoolShuttingDown),
        }
    }

    /// Submit `task`, waiting for an outstanding result whenever the queue is full.
    /// Every result taken off the channel meanwhile is appended to `received`.
    pub async fn submit_with_backpressure(
        &self,
        task: Task,
        received: &mut Vec<TaskResult>,
    ) -> Result<()> {
        loop {
            while let Some(result) = self.try_recv_result() {
                received.push(result);
            }
            match self.submit_task(task.clone()) {
                Err(OrchestrationError::QueueFull) => match self.recv_result().await {
                    Some(result) => received.push(result),
                    None => return Err(OrchestrationError::PoolNotRunning),
                },
                other => return other,
            }
        }
    }

    /// Results dropped because the result channel was full
    pub fn dropped_results(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Wait for the next result; `None` once the pool has stopped and every result has
    /// been received
    pub async fn recv_result(&self) -> Option<TaskResult> {
        self.result_rx.lock().await.recv().await
    }

    /// Take a result if one is ready
    pub fn try_recv_result(&self) -> Option<TaskResult> {
        self.result_rx.try_lock().ok()?.try_recv().ok()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn stats(&self) -> WorkerPoolStats {
        let state = self.state.lock();
        let queued_tasks = state
            .task_tx
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);

        WorkerPoolStats {
            pool_id: self.pool_id,
            workers: self.workers,
            running: state.running,
            queue_capacity: self.capacity,
            queued_tasks,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped_results: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    worker_index: usize,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    result_tx: mpsc::Sender<TaskResult>,
    counters: Arc<PoolCounters>,
) {
    debug!(worker_index, "Worker started");

    loop {
        let next = task_rx.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let started = Instant::now();
        let outcome = match tokio::spawn(task.run()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(worker_index, task_id = %task.id, "❌ Task terminated abnormally: {}", e);
                Err(anyhow::anyhow!("task panicked: {e}"))
            }
        };
        let result = TaskResult::from_outcome(task.id, &outcome, 1, started.elapsed());

        if result.success {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }

        match result_tx.try_send(result) {
            Ok(()) => {}
            Err(TrySendError::Full(result)) | Err(TrySendError::Closed(result)) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker_index,
                    task_id = %result.task_id,
                    success = result.success,
                    "⚠️ Result channel unavailable, dropping task result"
                );
            }
        }
    }

    debug!(worker_index, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_task(id: &str) -> Task {
        Task::new(id, || async { Ok(()) })
    }

    #[tokio::test]
    async fn test_submit_requires_running_pool() {
        let pool = WorkerPool::new(2);
        let err = pool.submit_task(ok_task("a")).unwrap_err();
        assert!(err.to_string().contains("not running"));

        pool.start().unwrap();
        pool.start().unwrap();
        pool.submit_task(ok_task("a")).unwrap();
        pool.stop().await;

        let err = pool.submit_task(ok_task("b")).unwrap_err();
        assert!(err.to_string().contains("not running"));
        assert!(pool.start().is_err());
    }

    #[tokio::test]
    async fn test_queued_tasks_drain_on_stop() {
        let pool = WorkerPool::new(1);
        pool.start().unwrap();
        pool.submit_task(ok_task("a")).unwrap();
        pool.submit_task(Task::new("b", || async { Err(anyhow::anyhow!("nope")) }))
            .unwrap();
        pool.stop().await;

        let mut results = Vec::new();
        while let Some(result) = pool.recv_result().await {
            results.push(result);
        }
        results.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].error.as_deref(), Some("nope"));
        assert!(results.iter().all(|r| r.attempts == 1));

        let stats = pool.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn test_queue_full_is_reported() {
        let pool = WorkerPool::new(1);
        pool.start().unwrap();

        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let blocking = move |id: &str| {
            let release_rx = release_rx.clone();
            Task::new(id, move || {
                let mut release_rx = release_rx.clone();
                async move {
                    let _ = release_rx.wait_for(|released| *released).await;
                    Ok(())
                }
            })
        };

        // One task held by the worker plus a full queue of two
        pool.submit_task(blocking("held")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        pool.submit_task(blocking("q1")).unwrap();
        pool.submit_task(blocking("q2")).unwrap();

        let err = pool.submit_task(blocking("overflow")).unwrap_err();
        assert!(err.to_string().contains("queue is full"));
        assert_eq!(pool.stats().queued_tasks, 2);

        release_tx.send(true).unwrap();
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_backpressure_submission_loses_nothing() {
        let pool = WorkerPool::new(1);
        pool.start().unwrap();

        let mut received = Vec::new();
        for i in 0..10 {
            pool.submit_with_backpressure(ok_task(&format!("task-{i}")), &mut received)
                .await
                .unwrap();
        }
        pool.stop().await;
        while let Some(result) = pool.recv_result().await {
            received.push(result);
        }

        assert_eq!(received.len(), 10);
        assert_eq!(pool.dropped_results(), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1);
        pool.start().unwrap();

        let mut received = Vec::new();
        pool.submit_with_backpressure(
            Task::new("boom", || async { panic!("task body bug") }),
            &mut received,
        )
        .await
        .unwrap();
        for i in 0..4 {
            pool.submit_with_backpressure(ok_task(&format!("ok-{i}")), &mut received)
                .await
                .unwrap();
        }

        let drained = tokio::time::timeout(std::time::Duration::from_secs(3), async {
            pool.stop().await;
            while let Some(result) = pool.recv_result().await {
                received.push(result);
            }
        })
        .await;
        assert!(drained.is_ok(), "pool hung after a panicking task");

        assert_eq!(received.len(), 5);
        let boom = received.iter().find(|r| r.task_id == "boom").unwrap();
        assert!(!boom.success);
        assert_eq!(boom.attempts, 1);
        assert!(boom.error.as_deref().unwrap().contains("task panicked"));
        assert_eq!(received.iter().filter(|r| r.success).count(), 4);
        assert_eq!(pool.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_parent_cancellation_means_shutting_down() {
        let parent = ExecutionContext::background();
        let pool = WorkerPool::with_context(1, &parent);
        pool.start().unwrap();
        parent.cancel();

        let err = pool.submit_task(ok_task("a")).unwrap_err();
        assert!(err.to_string().contains("shutting down"));
        pool.stop().await;
    }
}
