//! # Execution Context
//!
//! Hierarchical cancellation with optional deadlines. The enhanced scheduler owns a root
//! context; every task execution derives a child carrying the task timeout, and the
//! resilience layer checks it before attempts and while waiting between them.
//!
//! Cancelling a context cancels every context derived from it. A running operation is
//! never interrupted: cancellation is only observed at [`ExecutionContext::err`] checks
//! and [`ExecutionContext::done`] waits.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::error::OrchestrationError;

#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
    parent: Option<ExecutionContext>,
}

impl ExecutionContext {
    /// A root context that is only done once cancelled explicitly
    pub fn background() -> Self {
        Self::build(None, None)
    }

    /// A cancellable child with no deadline of its own
    pub fn child(&self) -> Self {
        Self::build(Some(self.clone()), None)
    }

    /// A child that is done once `timeout` has elapsed, or when this context is done
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Some(self.clone()), Instant::now().checked_add(timeout))
    }

    fn build(parent: Option<ExecutionContext>, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Cancel this context and everything derived from it
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, or `None` while it is still live
    pub fn err(&self) -> Option<OrchestrationError> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(OrchestrationError::context_canceled());
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Some(OrchestrationError::deadline_exceeded());
            }
        }
        self.inner.parent.as_ref().and_then(ExecutionContext::err)
    }

    /// Earliest deadline along the chain of contexts
    pub fn deadline(&self) -> Option<Instant> {
        let parent_deadline = self.inner.parent.as_ref().and_then(ExecutionContext::deadline);
        match (self.inner.deadline, parent_deadline) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// Resolves once the context is done
    pub fn done(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.cancelled.load(Ordering::Acquire) {
                return;
            }

            let deadline = async {
                match self.inner.deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let parent = async {
                match &self.inner.parent {
                    Some(parent) => parent.done().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = deadline => {}
                _ = parent => {}
            }
        })
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.inner.cancelled.load(Ordering::Acquire))
            .field("deadline", &self.inner.deadline)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
