//! # Bulkhead
//!
//! Bounded-concurrency gate with load shedding: when every slot is taken, calls fail
//! immediately instead of queueing. A slot is released when the operation completes,
//! including when it unwinds from a panic (the permit is dropped); panics themselves are
//! not recovered here.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{OrchestrationError, Result};

#[derive(Debug)]
pub struct Bulkhead {
    name: String,
    capacity: usize,
    semaphore: Semaphore,
    rejected: AtomicU64,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            semaphore: Semaphore::new(capacity),
            rejected: AtomicU64::new(0),
        }
    }

    /// Run `operation` in a free slot, or fail fast.
    ///
    /// Returns the context's error if `ctx` is already done, and
    /// [`OrchestrationError::BulkheadFull`] if no slot is free.
    pub async fn execute<T, E, F, Fut>(&self, ctx: &ExecutionContext, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<OrchestrationError>,
    {
        if let Some(reason) = ctx.err() {
            return Err(reason);
        }

        let _permit = match self.semaphore.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    component = %self.name,
                    capacity = self.capacity,
                    "🚧 Bulkhead at capacity, shedding call"
                );
                return Err(OrchestrationError::BulkheadFull {
                    capacity: self.capacity,
                });
            }
        };

        debug!(
            component = %self.name,
            in_use = self.current_concurrency(),
            capacity = self.capacity,
            "Bulkhead slot acquired"
        );

        operation().await.map_err(Into::into)
    }

    /// Slots currently held
    pub fn current_concurrency(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Calls shed since creation
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
