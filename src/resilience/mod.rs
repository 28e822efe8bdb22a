//! # Resilience Module
//!
//! Fault tolerance around task execution: retry with exponential backoff, a circuit
//! breaker, and a bulkhead concurrency limiter.
//!
//! ## Composition
//!
//! The enhanced scheduler wraps each task as
//! `Bulkhead → CircuitBreaker (optional) → Retry → task`. The bulkhead slot and the
//! breaker outcome both cover the whole retry sequence, not individual attempts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_scheduler::context::ExecutionContext;
//! use tasker_scheduler::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryExecutor};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new(
//!     "downstream_api",
//!     CircuitBreakerConfig {
//!         failure_threshold: 5,
//!         reset_timeout: Duration::from_secs(30),
//!     },
//! );
//! let retry = RetryExecutor::new(RetryConfig::default());
//! let ctx = ExecutionContext::background();
//!
//! breaker
//!     .call(|| retry.execute(&ctx, || async { Ok::<_, anyhow::Error>(()) }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod policy;
pub mod retry;

pub use bulkhead::Bulkhead;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
pub use config::{BulkheadConfig, CircuitBreakerConfig, RetryConfig};
pub use policy::ResiliencePolicies;
pub use retry::RetryExecutor;
