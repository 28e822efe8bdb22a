#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Scheduler
//!
//! In-process, dependency-aware task scheduling with a worker pool and a resilience layer.
//!
//! ## Overview
//!
//! A task is an opaque async operation that succeeds or fails. Tasks are registered by
//! ID with optional dependencies, then run:
//!
//! - depth-first, dependencies first, stopping at the first failure;
//! - concurrently on a fixed pool of workers, with one [`TaskResult`] per task;
//! - behind retry with exponential backoff, a circuit breaker and a bulkhead.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Schedulers, task registry and worker pool
//! - [`resilience`] - Retry executor, circuit breaker and bulkhead
//! - [`context`] - Hierarchical cancellation with deadlines
//! - [`config`] - Configuration structs and YAML loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tasker_scheduler::{EnhancedScheduler, EnhancedTask, Task};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = EnhancedScheduler::with_defaults()?;
//!
//! scheduler.add_task(Task::new("fetch", || async { Ok(()) }))?;
//! scheduler.add_enhanced_task(
//!     EnhancedTask::new(Task::new("index", || async { Ok(()) }).depends_on(["fetch"]))
//!         .with_max_retries(5)
//!         .with_timeout(Duration::from_secs(10))
//!         .with_circuit_breaker(),
//! )?;
//!
//! scheduler.run_sequential().await?;
//! println!("{:?}", scheduler.get_stats());
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property-based tests
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod resilience;

pub use config::{ConfigManager, ExecutionConfig, SchedulerConfig, WorkerPoolConfig};
pub use context::ExecutionContext;
pub use error::{OrchestrationError, Result};
pub use orchestration::{
    EnhancedScheduler, EnhancedTask, Scheduler, SchedulerStats, Task, TaskResult, WorkerPool,
    WorkerPoolStats,
};
pub use resilience::{
    Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig,
    RetryExecutor,
};
