//! # Retry Executor
//!
//! Runs an operation up to `max_attempts` times with exponential backoff and jitter.
//! Panics raised by the operation are caught and treated as ordinary failures; each one
//! still consumes an attempt.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{OrchestrationError, Result};
use crate::resilience::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts, or `ctx` is done.
    pub async fn execute<T, F, Fut>(&self, ctx: &ExecutionContext, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if let Some(reason) = ctx.err() {
                return Err(OrchestrationError::Cancelled(format!(
                    "operation cancelled before attempt {attempt}: {reason}"
                )));
            }

            let outcome = AssertUnwindSafe(async { operation().await })
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(attempt, max_attempts, "🟢 Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(error)) => error,
                Err(payload) => {
                    let error = panic_to_error(payload);
                    warn!(attempt, error = %error, "Operation panicked");
                    error
                }
            };

            if !self.is_retryable(&error) {
                debug!(attempt, error = %error, "Error is not retryable, aborting");
                return Err(OrchestrationError::NonRetryable {
                    attempt,
                    cause: error,
                });
            }

            if attempt == max_attempts {
                last_error = Some(error);
                break;
            }

            let delay = self.calculate_delay(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "🔄 Attempt failed, backing off before retry"
            );
            last_error = Some(error);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.done() => {
                    let reason = ctx
                        .err()
                        .unwrap_or_else(OrchestrationError::context_canceled);
                    return Err(OrchestrationError::Cancelled(format!(
                        "cancelled during backoff: {reason}"
                    )));
                }
            }
        }

        Err(OrchestrationError::RetriesExhausted {
            attempts: max_attempts,
            cause: last_error.unwrap_or_else(|| anyhow::anyhow!("no attempts were made")),
        })
    }

    /// Backoff before the attempt following `attempt` (1-based):
    /// `min(initial * factor^(attempt-1), max) + jitter`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_nanos = self.config.max_delay.as_nanos() as f64;
        let raw_nanos =
            self.config.initial_delay.as_nanos() as f64 * self.config.backoff_factor.powi(exponent);
        let capped_nanos = if raw_nanos.is_finite() {
            raw_nanos.min(max_nanos)
        } else {
            max_nanos
        };

        let jitter_nanos = if self.config.jitter_factor > 0.0 {
            capped_nanos * self.config.jitter_factor * fastrand::f64()
        } else {
            0.0
        };

        Duration::from_nanos((capped_nanos + jitter_nanos).max(0.0) as u64)
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        if self.config.retryable_errors.is_empty() {
            return true;
        }
        let message = error.to_string();
        self.config
            .retryable_errors
            .iter()
            .any(|retryable| *retryable == message)
    }
}

/// Convert a panic payload into an error, reusing it when it already is one
fn panic_to_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let payload = match payload.downcast::<anyhow::Error>() {
        Ok(error) => return *error,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<OrchestrationError>() {
        Ok(error) => return anyhow::Error::new(*error),
        Err(payload) => payload,
    };
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        anyhow::anyhow!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        anyhow::anyhow!("panic: {message}")
    } else {
        anyhow::anyhow!("panic: unknown payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            jitter_factor: 0.0,
            retryable_errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(fast_config(5));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = executor
            .execute(&ExecutionContext::background(), || {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 3 {
                        anyhow::bail!("transient failure {call}");
                    }
                    Ok(call)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = executor
            .execute(&ExecutionContext::background(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::anyhow!("always fails")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, OrchestrationError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(err.to_string(), "operation failed after 3 attempts: always fails");
    }

    #[tokio::test]
    async fn test_non_retryable_error_aborts_immediately() {
        let mut config = fast_config(5);
        config.retryable_errors = vec!["connection reset".to_string()];
        let executor = RetryExecutor::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = executor
            .execute(&ExecutionContext::background(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::anyhow!("invalid input")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, OrchestrationError::NonRetryable { attempt: 1, .. }));
    }

    #[tokio::test]
    async fn test_retryable_error_matches_by_string() {
        let mut config = fast_config(3);
        config.retryable_errors = vec!["connection reset".to_string()];
        let executor = RetryExecutor::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = executor
            .execute(&ExecutionContext::background(), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        anyhow::bail!("connection reset");
                    }
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panic_is_recovered_and_consumes_attempt() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = executor
            .execute(&ExecutionContext::background(), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("worker exploded");
                    }
                    Ok("recovered")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panic_message_becomes_error() {
        let executor = RetryExecutor::new(fast_config(1));
        let err = executor
            .execute(&ExecutionContext::background(), || async {
                if true {
                    panic!("bad state");
                }
                Ok::<(), anyhow::Error>(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("panic: bad state"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let executor = RetryExecutor::new(fast_config(3));
        let ctx = ExecutionContext::background();
        ctx.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = executor
            .execute(&ctx, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), anyhow::Error>(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let mut config = fast_config(5);
        config.initial_delay = Duration::from_secs(10);
        config.max_delay = Duration::from_secs(10);
        let executor = RetryExecutor::new(config);
        let ctx = ExecutionContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(2),
            executor.execute(&ctx, || async { Err::<(), _>(anyhow::anyhow!("fails")) }),
        )
        .await
        .expect("backoff should be interrupted")
        .unwrap_err();

        assert!(err.to_string().contains("cancelled during backoff"));
    }

    #[test]
    fn test_calculate_delay_without_jitter() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_factor: 2.0,
            jitter_factor: 0.0,
            retryable_errors: Vec::new(),
        });

        assert_eq!(executor.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(executor.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(executor.calculate_delay(3), Duration::from_millis(400));
        assert_eq!(executor.calculate_delay(10), Duration::from_millis(1000));
    }

    #[test]
    fn test_calculate_delay_jitter_bounds() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            jitter_factor: 0.5,
            retryable_errors: Vec::new(),
        });

        for _ in 0..100 {
            let delay = executor.calculate_delay(2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(300));
        }
    }

    #[test]
    fn test_calculate_delay_huge_attempt_is_capped() {
        let executor = RetryExecutor::new(RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        });
        assert_eq!(executor.calculate_delay(u32::MAX), executor.config().max_delay);
    }
}
