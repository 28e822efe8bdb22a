//! Task builders shared by the integration tests

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_scheduler::config::SchedulerConfig;
use tasker_scheduler::Task;

/// Order in which tasks ran
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) {
        self.entries.lock().push(id.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.lock().iter().position(|entry| entry == id)
    }

    pub fn count(&self, id: &str) -> usize {
        self.entries.lock().iter().filter(|entry| *entry == id).count()
    }
}

/// Task that appends its ID to `log` and succeeds
pub fn recording_task(id: &str, log: &ExecutionLog) -> Task {
    let log = log.clone();
    let name = id.to_string();
    Task::new(id, move || {
        let log = log.clone();
        let name = name.clone();
        async move {
            log.record(&name);
            Ok(())
        }
    })
}

/// Task that counts its calls and always fails with `message`
pub fn failing_task(id: &str, message: &'static str, calls: &Arc<AtomicU32>) -> Task {
    let calls = calls.clone();
    Task::new(id, move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!(message))
        }
    })
}

/// Task that fails its first `failures` calls, then succeeds
pub fn flaky_task(id: &str, failures: u32, calls: &Arc<AtomicU32>) -> Task {
    let calls = calls.clone();
    Task::new(id, move || {
        let calls = calls.clone();
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call < failures {
                anyhow::bail!("transient failure {}", call + 1);
            }
            Ok(())
        }
    })
}

/// Task that sleeps for `duration` before succeeding
pub fn sleeping_task(id: &str, duration: Duration) -> Task {
    Task::new(id, move || async move {
        tokio::time::sleep(duration).await;
        Ok(())
    })
}

/// Scheduler configuration with millisecond backoff so retry tests stay fast
pub fn fast_retry_config() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(10);
    config.retry.jitter_factor = 0.0;
    config
}
