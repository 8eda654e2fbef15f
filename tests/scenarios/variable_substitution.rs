//! Test: Variable substitution - placeholders resolved by the built-in services

use crate::helpers::*;
use sluice::core::{InfraOutputs, ResolveError, Task};
use sluice::execution::EngineError;
use sluice::services::ServiceError;
use sluice::Pipeline;
use std::collections::HashMap;

fn infra() -> InfraOutputs {
    HashMap::from([(
        "web".to_string(),
        HashMap::from([("url".to_string(), "https://web.test".to_string())]),
    )])
}

#[tokio::test]
async fn test_shell_sees_every_placeholder_source() {
    std::env::set_var("SLUICE_SCENARIO_GREETING", "hello");
    std::env::remove_var("SLUICE_SCENARIO_UNSET");

    let harness = Harness::new(0);
    let pipeline = Pipeline::new("vars")
        .with_task("build", Task::new("record").with_parameter("status", "green"))
        .with_task(
            "report",
            Task::new("shell")
                .with_dependencies(["build"])
                .with_parameter(
                    "command",
                    "echo '${env:SLUICE_SCENARIO_GREETING}[${env:SLUICE_SCENARIO_UNSET}] ${param:who} ${context:build.status} ${infra:web.url} ${infra:db.host}'",
                ),
        );

    let params = HashMap::from([("who".to_string(), "ops".to_string())]);
    let report = harness.run_with(&pipeline, params, infra()).await.unwrap();

    assert_task_succeeded(&report, "report");
    assert_eq!(
        report.context.event_value("report", "stdout").as_deref(),
        Some("hello[] ops green https://web.test")
    );
}

#[tokio::test]
async fn test_outputs_flow_between_shell_tasks() {
    let harness = Harness::new(0);
    let pipeline = Pipeline::new("flow")
        .with_task("version", Task::new("shell").with_parameter("command", "echo 1.4.2"))
        .with_task(
            "tag",
            Task::new("shell")
                .with_dependencies(["version"])
                .with_parameter("command", "echo v${context:version.stdout}"),
        );

    let report = harness.run(&pipeline).await.unwrap();

    assert_eq!(report.context.event_value("tag", "stdout").as_deref(), Some("v1.4.2"));
}

#[tokio::test]
async fn test_unknown_parameter_fails_task() {
    let harness = Harness::new(0);
    let pipeline = Pipeline::new("missing-param")
        .with_task("greet", Task::new("shell").with_parameter("command", "echo ${param:missing}"));

    let err = harness.run(&pipeline).await.unwrap_err();

    match err {
        EngineError::TaskFailed {
            source: ServiceError::Resolve(ResolveError::UnknownParameter(name)),
            ..
        } => assert_eq!(name, "missing"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_unknown_source_fails_task() {
    let harness = Harness::new(0);
    let pipeline = Pipeline::new("bogus")
        .with_task("greet", Task::new("shell").with_parameter("command", "echo ${bogus:x}"));

    let err = harness.run(&pipeline).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::TaskFailed {
            source: ServiceError::Resolve(ResolveError::InvalidReference(_)),
            ..
        }
    ));
}
