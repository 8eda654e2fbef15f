//! Test utilities for sluice scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use sluice::core::{event_values, InfraOutputs, RunContext, RunInfo, Task, TaskState};
use sluice::execution::{EngineError, ExecutionEngine, ExecutionEvent, RunReport};
use sluice::services::{Service, ServiceError, ServiceRegistry};
use sluice::Pipeline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered log of service start/finish marks shared by mock services
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("'{}' not found in journal {:?}", entry, self.entries()))
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// Succeeds after an optional pause, journaling `start:<task>` and `finish:<task>`
pub struct RecordingService {
    pub journal: Journal,
    pub pause: Duration,
}

#[async_trait]
impl Service for RecordingService {
    fn name(&self) -> &str {
        "record"
    }

    async fn run(
        &self,
        task: &Task,
        task_name: &str,
        context: &RunContext,
        _infra: &InfraOutputs,
        _run: &RunInfo,
    ) -> Result<(), ServiceError> {
        self.journal.record(format!("start:{}", task_name));
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }

        let mut values = HashMap::from([("success".to_string(), "true".to_string())]);
        if let Some(status) = task.parameter("status").and_then(|v| v.as_str()) {
            values.insert("status".to_string(), status.to_string());
        }
        context.set_event_values(task_name, values);

        self.journal.record(format!("finish:{}", task_name));
        Ok(())
    }
}

/// Fails its first `failures` calls, then succeeds
pub struct FlakyService {
    pub calls: Arc<AtomicU32>,
    pub failures: u32,
}

impl FlakyService {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for FlakyService {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(
        &self,
        _task: &Task,
        task_name: &str,
        context: &RunContext,
        _infra: &InfraOutputs,
        _run: &RunInfo,
    ) -> Result<(), ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            context.set_event_values(task_name, event_values([("success", "false")]));
            return Err(ServiceError::Failed(format!("attempt {} failed", call)));
        }
        context.set_event_values(task_name, event_values([("success", "true")]));
        Ok(())
    }
}

/// Builds an engine around mock services and records its events
pub struct Harness {
    pub journal: Journal,
    pub flaky_calls: Arc<AtomicU32>,
    pub events: Arc<Mutex<Vec<ExecutionEvent>>>,
    pub engine: ExecutionEngine,
}

impl Harness {
    pub fn new(flaky_failures: u32) -> Self {
        Self::with_pause(flaky_failures, Duration::ZERO)
    }

    pub fn with_pause(flaky_failures: u32, pause: Duration) -> Self {
        let journal = Journal::default();
        let flaky_calls = Arc::new(AtomicU32::new(0));

        let mut registry = ServiceRegistry::with_builtin_services();
        registry.register(RecordingService {
            journal: journal.clone(),
            pause,
        });
        registry.register(FlakyService {
            calls: Arc::clone(&flaky_calls),
            failures: flaky_failures,
        });

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut engine = ExecutionEngine::new(registry).with_workers(4);
        engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

        Self {
            journal,
            flaky_calls,
            events,
            engine,
        }
    }

    pub fn with_workers(self, workers: usize) -> Self {
        Self {
            engine: self.engine.with_workers(workers),
            ..self
        }
    }

    pub async fn run(&self, pipeline: &Pipeline) -> Result<RunReport, EngineError> {
        self.run_with(pipeline, HashMap::new(), InfraOutputs::new()).await
    }

    pub async fn run_with(
        &self,
        pipeline: &Pipeline,
        params: HashMap<String, String>,
        infra: InfraOutputs,
    ) -> Result<RunReport, EngineError> {
        let run = RunInfo::in_dir(std::env::temp_dir(), params);
        self.engine
            .execute(pipeline, Arc::new(run), Arc::new(infra))
            .await
    }

    /// Run to completion, keeping the report of a failed run
    pub async fn run_to_report(&self, pipeline: &Pipeline) -> RunReport {
        let run = RunInfo::in_dir(std::env::temp_dir(), HashMap::new());
        self.engine
            .execute_with_report(pipeline, Arc::new(run), Arc::new(InfraOutputs::new()))
            .await
            .expect("pipeline graph should build")
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_events(&self, matches: impl Fn(&ExecutionEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    pub fn flaky_calls(&self) -> u32 {
        self.flaky_calls.load(Ordering::SeqCst)
    }
}

/// Assert a task finished with the service succeeding
pub fn assert_task_succeeded(report: &RunReport, task: &str) {
    let state = report
        .state(task)
        .unwrap_or_else(|| panic!("Task '{}' not found in report", task));
    assert!(
        matches!(state, TaskState::Succeeded { .. }),
        "Task '{}' should have succeeded, but was in state: {:?}",
        task,
        state
    );
}

/// Assert a task was skipped and its synthetic context entry was written
pub fn assert_task_skipped(report: &RunReport, task: &str) {
    let state = report
        .state(task)
        .unwrap_or_else(|| panic!("Task '{}' not found in report", task));
    assert!(
        matches!(state, TaskState::Skipped { .. }),
        "Task '{}' should have been skipped, but was in state: {:?}",
        task,
        state
    );
    assert_eq!(report.context.event_value(task, "skipped").as_deref(), Some("true"));
    assert_eq!(report.context.event_value(task, "success").as_deref(), Some("skipped"));
}

/// Assert every task reached a terminal state
pub fn assert_run_complete(report: &RunReport) {
    assert_eq!(
        report.completed, report.total,
        "run completed {} of {} tasks",
        report.completed, report.total
    );
    for (task, state) in &report.states {
        assert!(state.is_terminal(), "Task '{}' ended in {:?}", task, state);
    }
}
