//! Test: Retry behavior - bounded attempts with a delay between them

use crate::helpers::*;
use sluice::core::{Task, TaskState};
use sluice::execution::{EngineError, ExecutionEvent};
use sluice::Pipeline;
use std::time::Duration;

fn retrying_pipeline() -> Pipeline {
    Pipeline::new("retry").with_task(
        "deploy",
        Task::new("flaky").with_retry(3, Duration::from_secs(1)),
    )
}

/// Fails on attempts 1 and 2, succeeds on 3
#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt() {
    let harness = Harness::new(2);
    let started = tokio::time::Instant::now();

    let report = harness.run(&retrying_pipeline()).await.unwrap();

    assert_eq!(report.state("deploy"), Some(&TaskState::Succeeded { attempts: 3 }));
    assert_eq!(harness.flaky_calls(), 3);
    assert_eq!(
        harness.count_events(|e| matches!(e, ExecutionEvent::TaskRetrying { .. })),
        2
    );
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.context.event_value("deploy", "success").as_deref(), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_events_carry_attempt_numbers() {
    let harness = Harness::new(2);
    harness.run(&retrying_pipeline()).await.unwrap();

    let retries: Vec<(u32, u32, Duration)> = harness
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ExecutionEvent::TaskRetrying {
                attempt,
                max_attempts,
                delay,
                ..
            } => Some((attempt, max_attempts, delay)),
            _ => None,
        })
        .collect();

    assert_eq!(
        retries,
        vec![
            (1, 3, Duration::from_secs(1)),
            (2, 3, Duration::from_secs(1)),
        ]
    );
}

/// Fails on all three attempts
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_the_run() {
    let harness = Harness::new(3);

    let err = harness.run(&retrying_pipeline()).await.unwrap_err();

    match err {
        EngineError::TaskFailed { task, attempts, source } => {
            assert_eq!(task, "deploy");
            assert_eq!(attempts, 3);
            assert_eq!(source.to_string(), "attempt 3 failed");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(harness.flaky_calls(), 3);
    assert_eq!(
        harness.count_events(|e| matches!(e, ExecutionEvent::TaskSucceeded { .. })),
        0
    );
    assert_eq!(
        harness.count_events(|e| matches!(e, ExecutionEvent::TaskFailed { .. })),
        1
    );
}

#[tokio::test]
async fn test_default_policy_makes_one_attempt() {
    let harness = Harness::new(1);
    let pipeline = Pipeline::new("once").with_task("deploy", Task::new("flaky"));

    let err = harness.run(&pipeline).await.unwrap_err();

    assert!(matches!(err, EngineError::TaskFailed { attempts: 1, .. }));
    assert_eq!(harness.flaky_calls(), 1);
    assert_eq!(
        harness.count_events(|e| matches!(e, ExecutionEvent::TaskRetrying { .. })),
        0
    );
}
