//! Integration tests for the plain scheduler's execution modes

mod common;

use common::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_scheduler::{OrchestrationError, Scheduler, Task};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_diamond_runs_in_dependency_order() {
    let log = ExecutionLog::new();
    let scheduler = Scheduler::new();

    assert_ok!(scheduler.add_task(recording_task("report", &log).depends_on(["left", "right"])));
    assert_ok!(scheduler.add_task(recording_task("left", &log).depends_on(["root"])));
    assert_ok!(scheduler.add_task(recording_task("right", &log).depends_on(["root"])));
    assert_ok!(scheduler.add_task(recording_task("root", &log)));

    assert_ok!(scheduler.run().await);

    assert_eq!(log.entries(), vec!["root", "left", "right", "report"]);
    assert_eq!(log.count("root"), 1);
    assert_eq!(scheduler.completed_count(), 4);
}

#[tokio::test]
async fn test_duplicate_id_keeps_first_registration() {
    let log = ExecutionLog::new();
    let scheduler = Scheduler::new();
    assert_ok!(scheduler.add_task(recording_task("a", &log)));

    let calls = Arc::new(AtomicU32::new(0));
    let err = assert_err!(scheduler.add_task(failing_task("a", "replacement", &calls)));
    assert!(err.to_string().contains("already exists"));

    assert_ok!(scheduler.run().await);
    assert_eq!(log.entries(), vec!["a"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failure_aborts_remaining_tasks() {
    let log = ExecutionLog::new();
    let calls = Arc::new(AtomicU32::new(0));
    let scheduler = Scheduler::new();

    scheduler.add_task(recording_task("first", &log)).unwrap();
    scheduler.add_task(failing_task("broken", "disk full", &calls)).unwrap();
    scheduler
        .add_task(recording_task("dependent", &log).depends_on(["broken"]))
        .unwrap();
    scheduler.add_task(recording_task("sibling", &log)).unwrap();

    let err = scheduler.run().await.unwrap_err();
    match err {
        OrchestrationError::TaskFailed { task_id, cause } => {
            assert_eq!(task_id, "broken");
            assert_eq!(cause.to_string(), "disk full");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(log.entries(), vec!["first"]);
    assert!(!scheduler.is_completed("broken"));
    assert!(!scheduler.is_completed("dependent"));
    assert!(!scheduler.is_completed("sibling"));
}

#[tokio::test]
async fn test_missing_dependency_names_the_dependency() {
    let log = ExecutionLog::new();
    let scheduler = Scheduler::new();
    scheduler
        .add_task(recording_task("a", &log).depends_on(["X"]))
        .unwrap();

    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::DependencyNotFound { ref task_id, ref dependency }
            if task_id == "a" && dependency == "X"
    ));
    assert!(err.to_string().contains("not found"));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_longer_cycle_is_reported() {
    let log = ExecutionLog::new();
    let scheduler = Scheduler::new();
    scheduler.add_task(recording_task("root", &log)).unwrap();
    scheduler
        .add_task(recording_task("a", &log).depends_on(["root", "c"]))
        .unwrap();
    scheduler
        .add_task(recording_task("b", &log).depends_on(["a"]))
        .unwrap();
    scheduler
        .add_task(recording_task("c", &log).depends_on(["b"]))
        .unwrap();

    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(err, OrchestrationError::CycleDetected(_)));
    assert_eq!(log.entries(), vec!["root"]);
}

#[tokio::test]
async fn test_retry_mode_gives_up_after_budget() {
    let calls = Arc::new(AtomicU32::new(0));
    let scheduler = Scheduler::new();
    scheduler
        .add_task(failing_task("unstable", "still down", &calls))
        .unwrap();

    let err = scheduler.execute_with_retry(2).await.unwrap_err();
    assert!(err.to_string().contains("failed after 2 attempts"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_mode_ignores_dependencies() {
    let log = ExecutionLog::new();
    let scheduler = Scheduler::new();
    scheduler
        .add_task(recording_task("a", &log).depends_on(["does-not-exist"]))
        .unwrap();
    for i in 0..20 {
        scheduler
            .add_task(recording_task(&format!("bulk-{i}"), &log))
            .unwrap();
    }

    let results = scheduler.execute_concurrent(3).await.unwrap();
    assert_eq!(results.len(), 21);
    assert!(results.iter().all(|r| r.success && r.attempts == 1));
    assert!(scheduler.is_completed("a"));
    assert_eq!(scheduler.completed_count(), 21);
}

#[tokio::test]
async fn test_concurrent_mode_runs_in_parallel() {
    let scheduler = Scheduler::new();
    for i in 0..4 {
        scheduler
            .add_task(sleeping_task(&format!("slow-{i}"), Duration::from_millis(100)))
            .unwrap();
    }

    let started = std::time::Instant::now();
    let results = scheduler.execute_concurrent(4).await.unwrap();
    assert_eq!(results.len(), 4);
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_autonomous_mode_fires_every_task() {
    let log = ExecutionLog::new();
    let calls = Arc::new(AtomicU32::new(0));
    let scheduler = Scheduler::new();
    scheduler.add_task(recording_task("a", &log)).unwrap();
    scheduler.add_task(failing_task("b", "ignored", &calls)).unwrap();
    scheduler
        .add_task(Task::new("c", || async { Ok(()) }).depends_on(["b"]))
        .unwrap();

    let handles = scheduler.execute_autonomous();
    assert_eq!(handles.len(), 3);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(log.entries(), vec!["a"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
