//! # Resilience Policies
//!
//! Shared handle to the policies currently in force for an enhanced scheduler. Compiled
//! task closures hold a clone of the handle and read the current retry defaults,
//! circuit breaker and bulkhead each time they execute, so swapping a policy applies to
//! every task from its next execution on.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::constants;
use crate::resilience::{
    Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig, RetryConfig,
};

#[derive(Debug)]
pub struct ResiliencePolicies {
    retry: RwLock<RetryConfig>,
    circuit_breaker: RwLock<Arc<CircuitBreaker>>,
    bulkhead: RwLock<Arc<Bulkhead>>,
}

impl ResiliencePolicies {
    pub fn new(
        retry: RetryConfig,
        circuit_breaker: CircuitBreakerConfig,
        bulkhead: BulkheadConfig,
    ) -> Self {
        Self {
            retry: RwLock::new(retry),
            circuit_breaker: RwLock::new(Arc::new(Self::build_breaker(circuit_breaker))),
            bulkhead: RwLock::new(Arc::new(Self::build_bulkhead(bulkhead.capacity))),
        }
    }

    fn build_breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new(constants::circuit_breaker::SCHEDULER_COMPONENT, config)
    }

    fn build_bulkhead(capacity: usize) -> Bulkhead {
        Bulkhead::new(constants::bulkhead::SCHEDULER_COMPONENT, capacity)
    }

    /// Default retry policy for tasks without their own
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.read().clone()
    }

    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        self.circuit_breaker.read().clone()
    }

    pub fn bulkhead(&self) -> Arc<Bulkhead> {
        self.bulkhead.read().clone()
    }

    pub fn set_retry_config(&self, config: RetryConfig) {
        info!(
            max_attempts = config.max_attempts,
            initial_delay_ms = config.initial_delay.as_millis() as u64,
            "🔧 Retry policy replaced"
        );
        *self.retry.write() = config;
    }

    /// Replace the breaker with a fresh, closed one
    pub fn set_circuit_breaker_config(&self, config: CircuitBreakerConfig) {
        let breaker = Arc::new(Self::build_breaker(config));
        *self.circuit_breaker.write() = breaker;
    }

    /// Replace the bulkhead with an empty one. Calls already holding a slot keep it in the
    /// previous bulkhead until they finish. A capacity of 0 is raised to 1.
    pub fn set_bulkhead_capacity(&self, capacity: usize) {
        if capacity == 0 {
            warn!("⚠️ Bulkhead capacity must be at least 1, using 1");
        }
        let capacity = capacity.max(1);
        info!(capacity, "🔧 Bulkhead replaced");
        *self.bulkhead.write() = Arc::new(Self::build_bulkhead(capacity));
    }
}

impl Default for ResiliencePolicies {
    fn default() -> Self {
        Self::new(
            RetryConfig::default(),
            CircuitBreakerConfig::default(),
            BulkheadConfig::default(),
        )
    }
}
