//! # Circuit Breaker Implementation
//!
//! Fault isolation for task execution. The classic three states:
//! Closed (normal operation), Open (failing fast), and Half-Open (testing recovery).
//!
//! Failures are counted as a consecutive streak: any success while closed resets the
//! count. Once open, the breaker stays open for `reset_timeout` after the last recorded
//! failure; the first call after that moves it to half-open and becomes the single probe.
//! While the probe runs, other callers are rejected. Only the probe's outcome moves a
//! half-open circuit; calls admitted earlier while closed just update the counters.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{OrchestrationError, Result};
use crate::resilience::CircuitBreakerConfig;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - a single probe call is allowed through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub current_state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    rejected_count: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            probe_in_flight: false,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_count: 0,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

/// Releases the half-open probe token if the probe's future is dropped before its
/// outcome is recorded
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.breaker.state.lock();
            state.probe_in_flight = false;
            warn!(component = %self.breaker.name, "Half-open probe abandoned before completion");
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// Current state as last recorded. An expired open circuit reports `Open` until the
    /// next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<OrchestrationError>,
    {
        let is_probe = self.admit()?;
        let mut guard = ProbeGuard {
            breaker: self,
            armed: is_probe,
        };

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        guard.disarm();
        match &result {
            Ok(_) => self.record_success(duration, is_probe),
            Err(_) => self.record_failure(duration, is_probe),
        }

        result.map_err(Into::into)
    }

    /// Decide whether a call may proceed; `Ok(true)` marks the half-open probe
    fn admit(&self) -> Result<bool> {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.reset_timeout {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    info!(component = %self.name, "🟡 Circuit breaker half-open (testing recovery)");
                    Ok(true)
                } else {
                    state.rejected_count += 1;
                    debug!(component = %self.name, "Circuit open, rejecting call");
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    state.rejected_count += 1;
                    debug!(component = %self.name, "Probe in flight, rejecting call");
                    Err(self.open_error())
                } else {
                    state.probe_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn open_error(&self) -> OrchestrationError {
        OrchestrationError::CircuitOpen {
            component: self.name.clone(),
        }
    }

    fn record_success(&self, duration: Duration, is_probe: bool) {
        let mut state = self.state.lock();
        state.total_calls += 1;
        state.success_count += 1;
        state.consecutive_failures = 0;

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "🟢 Operation succeeded"
        );

        if is_probe && state.state == CircuitState::HalfOpen {
            state.state = CircuitState::Closed;
            state.probe_in_flight = false;
            state.last_failure = None;
            info!(
                component = %self.name,
                total_calls = state.total_calls,
                "🟢 Circuit breaker closed (recovered)"
            );
        }
    }

    fn record_failure(&self, duration: Duration, is_probe: bool) {
        let mut state = self.state.lock();
        state.total_calls += 1;
        state.failure_count += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Instant::now());

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            consecutive_failures = state.consecutive_failures,
            "🔴 Operation failed"
        );

        let should_open = match state.state {
            // A failed probe immediately reopens the circuit
            CircuitState::HalfOpen => is_probe,
            CircuitState::Closed => {
                state.consecutive_failures >= self.config.failure_threshold.max(1)
            }
            CircuitState::Open => false,
        };

        if should_open {
            state.state = CircuitState::Open;
            state.probe_in_flight = false;
            error!(
                component = %self.name,
                consecutive_failures = state.consecutive_failures,
                failure_threshold = self.config.failure_threshold,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                "🔴 Circuit breaker opened (failing fast)"
            );
        }
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut state = self.state.lock();
        state.state = CircuitState::Open;
        state.probe_in_flight = false;
        state.last_failure = Some(Instant::now());
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut state = self.state.lock();
        state.state = CircuitState::Closed;
        state.probe_in_flight = false;
        state.consecutive_failures = 0;
        state.last_failure = None;
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.state.lock();
        CircuitBreakerMetrics {
            current_state: state.state,
            consecutive_failures: state.consecutive_failures,
            total_calls: state.total_calls,
            success_count: state.success_count,
            failure_count: state.failure_count,
            rejected_count: state.rejected_count,
        }
    }
}
