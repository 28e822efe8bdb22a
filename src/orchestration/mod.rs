//! # Orchestration Engine
//!
//! Dependency-aware task scheduling on top of a worker pool and the resilience layer.
//!
//! ## Core Components
//!
//! - **Scheduler**: registry of plain tasks with sequential, retrying, concurrent and
//!   autonomous execution modes
//! - **EnhancedScheduler**: tasks wrapped in bulkhead, circuit breaker and retry, run
//!   sequentially or on a long-lived worker pool, with hot-swappable policies
//! - **WorkerPool**: fixed workers over bounded task and result channels
//! - **TaskRegistry**: task storage, completion state and the depth-first runner
//!
//! ## Dependencies
//!
//! Sequential modes run each task after its dependencies and stop at the first failure.
//! Pool-driven modes (`Scheduler::execute_concurrent`, `EnhancedScheduler::run_async`)
//! ignore dependencies and assume the tasks are independent.

pub mod enhanced_scheduler;
pub mod registry;
pub mod scheduler;
pub mod types;
pub mod worker_pool;

pub use enhanced_scheduler::{EnhancedScheduler, SchedulerStats};
pub use registry::{ExecutionStrategy, TaskRegistry};
pub use scheduler::Scheduler;
pub use types::{EnhancedTask, Task, TaskFn, TaskFuture, TaskResult};
pub use worker_pool::{WorkerPool, WorkerPoolStats};
