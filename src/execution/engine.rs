//! Main execution engine - drives a task graph to completion
//!
//! Tasks are dispatched by indegree rather than in topological levels: a
//! task becomes ready the moment its last dependency reaches a terminal
//! state, and a fixed pool of workers pulls ready tasks from one shared
//! queue. Every way a run can end (all tasks done, a fatal failure, or a
//! stall) goes through [`Dispatch::close`], which drops the queue's only
//! sender exactly once.

use crate::{
    core::{
        condition, event_values, Graph, GraphError, InfraOutputs, Pipeline, Resolver, RunContext,
        RunInfo, RunStatus, TaskState,
    },
    services::{Service, ServiceError, ServiceRegistry},
};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Events that can occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: String,
        tasks: usize,
    },
    TaskStarted {
        task: String,
        attempt: u32,
    },
    TaskRetrying {
        task: String,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        error: String,
    },
    TaskSucceeded {
        task: String,
        attempts: u32,
    },
    TaskSkipped {
        task: String,
        reason: String,
    },
    TaskFailed {
        task: String,
        error: String,
        attempts: u32,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fatal conditions that end a run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("task '{task}' uses unrecognized service '{service}'")]
    UnrecognizedService { task: String, service: String },

    #[error("task '{task}' failed after {attempts} attempt(s): {source}")]
    TaskFailed {
        task: String,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error("run did not complete all tasks: completed {completed} of {total}")]
    Incomplete { completed: usize, total: usize },
}

/// Outcome of one run: per-task states and the context, whether or not it succeeded
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,

    /// Final state of every task; tasks never started stay `Pending` or `Ready`
    pub states: HashMap<String, TaskState>,

    pub completed: usize,
    pub total: usize,

    /// Everything tasks recorded during the run
    pub context: Arc<RunContext>,

    /// First fatal condition, if the run failed
    pub failure: Option<EngineError>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    /// Split off the failure, if any
    pub fn into_result(mut self) -> Result<RunReport, EngineError> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Final state of one task
    pub fn state(&self, task: &str) -> Option<&TaskState> {
        self.states.get(task)
    }

    /// Number of tasks whose service succeeded
    pub fn succeeded(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, TaskState::Succeeded { .. }))
            .count()
    }

    /// Number of tasks skipped by their condition
    pub fn skipped(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, TaskState::Skipped { .. }))
            .count()
    }
}

/// Pipeline execution engine
pub struct ExecutionEngine {
    registry: Arc<ServiceRegistry>,
    workers: usize,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    /// Create an engine with one worker per available CPU
    pub fn new(registry: ServiceRegistry) -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        Self {
            registry: Arc::new(registry),
            workers,
            event_handlers: Vec::new(),
        }
    }

    /// Override the worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Build a fresh graph for `pipeline` and run it
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        run: Arc<RunInfo>,
        infra: Arc<InfraOutputs>,
    ) -> Result<RunReport, EngineError> {
        self.execute_with_report(pipeline, run, infra)
            .await?
            .into_result()
    }

    /// Like [`execute`](Self::execute), but a failed run still yields its report
    ///
    /// Only graph errors, which stop the run before any task starts, are
    /// returned as `Err`.
    pub async fn execute_with_report(
        &self,
        pipeline: &Pipeline,
        run: Arc<RunInfo>,
        infra: Arc<InfraOutputs>,
    ) -> Result<RunReport, GraphError> {
        let graph = Graph::build(pipeline)?;
        info!(
            "Starting pipeline execution: {} ({})",
            pipeline.name, run.run_id
        );
        Ok(self.execute_graph_with_report(graph, run, infra).await)
    }

    /// Run an already built graph
    pub async fn execute_graph(
        &self,
        graph: Graph,
        run: Arc<RunInfo>,
        infra: Arc<InfraOutputs>,
    ) -> Result<RunReport, EngineError> {
        self.execute_graph_with_report(graph, run, infra)
            .await
            .into_result()
    }

    pub async fn execute_graph_with_report(
        &self,
        graph: Graph,
        run: Arc<RunInfo>,
        infra: Arc<InfraOutputs>,
    ) -> RunReport {
        let total = graph.len();
        let (sender, receiver) = mpsc::channel(total.max(1));

        let mut dispatch = Dispatch {
            indegree: graph.indegree.clone(),
            states: graph
                .nodes
                .keys()
                .map(|name| (name.clone(), TaskState::Pending))
                .collect(),
            queued: 0,
            running: 0,
            completed: 0,
            sender: Some(sender),
            failure: None,
        };
        for root in graph.roots() {
            dispatch.push(root);
        }
        if dispatch.queued == 0 && total > 0 {
            warn!("no task is ready to run");
        }
        if dispatch.queued == 0 {
            dispatch.close();
        }

        let shared = Arc::new(Shared {
            graph,
            registry: Arc::clone(&self.registry),
            context: Arc::new(RunContext::new()),
            infra,
            run: Arc::clone(&run),
            handlers: self.event_handlers.clone(),
            dispatch: Mutex::new(dispatch),
            ready: tokio::sync::Mutex::new(receiver),
        });

        shared.emit(ExecutionEvent::RunStarted {
            run_id: run.run_id.clone(),
            tasks: total,
        });

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker(id, Arc::clone(&shared)));
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("worker terminated abnormally: {}", e);
            }
        }

        let (failure, completed, states) = {
            let mut dispatch = shared.dispatch();
            (
                dispatch.failure.take(),
                dispatch.completed,
                std::mem::take(&mut dispatch.states),
            )
        };

        let failure = match failure {
            Some(err) => Some(err),
            None if completed != total => Some(EngineError::Incomplete { completed, total }),
            None => None,
        };
        let report = RunReport {
            run_id: run.run_id.clone(),
            states,
            completed,
            total,
            context: Arc::clone(&shared.context),
            failure,
        };

        match &report.failure {
            None => info!("Pipeline completed: {} of {} tasks", completed, total),
            Some(e) => error!("Pipeline failed: {}", e),
        }
        shared.emit(ExecutionEvent::RunFinished {
            run_id: run.run_id.clone(),
            status: report.status(),
        });

        report
    }
}

/// Bookkeeping shared by all workers, guarded by one mutex
struct Dispatch {
    indegree: HashMap<String, usize>,
    states: HashMap<String, TaskState>,
    /// Pushed onto the queue but not yet taken by a worker
    queued: usize,
    running: usize,
    completed: usize,
    /// `None` once the queue is closed
    sender: Option<mpsc::Sender<String>>,
    /// First fatal condition of the run
    failure: Option<EngineError>,
}

impl Dispatch {
    fn push(&mut self, name: String) {
        let Some(sender) = &self.sender else {
            return;
        };
        // Capacity equals the node count and each node is pushed at most once
        match sender.try_send(name.clone()) {
            Ok(()) => {
                self.queued += 1;
                self.states.insert(name, TaskState::Ready);
            }
            Err(e) => error!("failed to queue task {}: {}", name, e),
        }
    }

    fn close(&mut self) {
        if self.sender.take().is_some() {
            debug!("ready queue closed");
        }
    }

    fn fail(&mut self, err: EngineError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.close();
    }
}

enum TaskOutcome {
    Skipped(String),
    Succeeded(u32),
    Failed { attempts: u32, error: ServiceError },
    Fatal(EngineError),
}

struct Shared {
    graph: Graph,
    registry: Arc<ServiceRegistry>,
    context: Arc<RunContext>,
    infra: Arc<InfraOutputs>,
    run: Arc<RunInfo>,
    handlers: Vec<EventHandler>,
    dispatch: Mutex<Dispatch>,
    ready: tokio::sync::Mutex<mpsc::Receiver<String>>,
}

async fn worker(id: usize, shared: Arc<Shared>) {
    loop {
        let next = shared.ready.lock().await.recv().await;
        let Some(name) = next else {
            break;
        };
        if !shared.take(&name) {
            break;
        }

        info!(worker = id, task = %name, "worker received task");
        let outcome = shared
            .process(&name)
            .instrument(info_span!("task", name = %name))
            .await;
        shared.finish(&name, outcome);
    }
    debug!(worker = id, "worker exiting");
}

impl Shared {
    fn dispatch(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }

    fn set_state(&self, name: &str, state: TaskState) {
        self.dispatch().states.insert(name.to_string(), state);
    }

    /// Move a dequeued task to running; false once the queue has been closed
    fn take(&self, name: &str) -> bool {
        let mut dispatch = self.dispatch();
        dispatch.queued = dispatch.queued.saturating_sub(1);
        if dispatch.sender.is_none() {
            debug!(task = %name, "queue closed; not starting task");
            return false;
        }
        dispatch.running += 1;
        true
    }

    async fn process(&self, name: &str) -> TaskOutcome {
        let Some(task) = self.graph.nodes.get(name) else {
            return TaskOutcome::Failed {
                attempts: 0,
                error: ServiceError::Failed(format!("task '{}' is not in the graph", name)),
            };
        };

        let resolver = Resolver::new(&self.context, &self.infra, &self.run);
        match condition::evaluate(task, &resolver) {
            Ok(outcome) if !outcome.should_run => {
                info!("Skipping task: {}", outcome.reason);
                self.context.set_event_values(
                    name,
                    event_values([
                        ("success", "skipped"),
                        ("skipped", "true"),
                        ("skip_reason", outcome.reason.as_str()),
                    ]),
                );
                return TaskOutcome::Skipped(outcome.reason);
            }
            Ok(outcome) => {
                if !outcome.reason.is_empty() {
                    debug!("{}", outcome.reason);
                }
            }
            Err(e) => warn!("condition evaluation failed, running task anyway: {}", e),
        }

        let Some(service) = self.registry.get(&task.service) else {
            return TaskOutcome::Fatal(EngineError::UnrecognizedService {
                task: name.to_string(),
                service: task.service.clone(),
            });
        };

        let max_attempts = task.max_attempts();
        let delay = task.retry_delay();
        let mut attempt = 1;

        loop {
            self.set_state(name, TaskState::Running { attempt });
            self.emit(ExecutionEvent::TaskStarted {
                task: name.to_string(),
                attempt,
            });

            match self.invoke(Arc::clone(&service), name).await {
                Ok(()) => return TaskOutcome::Succeeded(attempt),
                Err(error) if attempt < max_attempts => {
                    warn!(
                        "attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max_attempts, error, delay
                    );
                    self.set_state(name, TaskState::Retrying { attempt });
                    self.emit(ExecutionEvent::TaskRetrying {
                        task: name.to_string(),
                        attempt,
                        max_attempts,
                        delay,
                        error: error.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return TaskOutcome::Failed {
                        attempts: attempt,
                        error,
                    }
                }
            }
        }
    }

    /// Run one attempt in its own task so a panicking service fails only that attempt
    async fn invoke(&self, service: Arc<dyn Service>, name: &str) -> Result<(), ServiceError> {
        let task = self.graph.nodes[name].clone();
        let name = name.to_string();
        let context = Arc::clone(&self.context);
        let infra = Arc::clone(&self.infra);
        let run = Arc::clone(&self.run);

        let handle = tokio::spawn(
            async move { service.run(&task, &name, &context, &infra, &run).await }
                .in_current_span(),
        );

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ServiceError::Panicked(join_error_message(e))),
        }
    }

    /// Record a terminal outcome and unlock dependents
    fn finish(&self, name: &str, outcome: TaskOutcome) {
        let (state, failure) = match outcome {
            TaskOutcome::Skipped(reason) => {
                self.emit(ExecutionEvent::TaskSkipped {
                    task: name.to_string(),
                    reason: reason.clone(),
                });
                (TaskState::Skipped { reason }, None)
            }
            TaskOutcome::Succeeded(attempts) => {
                info!(task = %name, attempts, "task succeeded");
                self.emit(ExecutionEvent::TaskSucceeded {
                    task: name.to_string(),
                    attempts,
                });
                (TaskState::Succeeded { attempts }, None)
            }
            TaskOutcome::Failed { attempts, error } => {
                error!(task = %name, attempts, "task failed: {}", error);
                self.emit(ExecutionEvent::TaskFailed {
                    task: name.to_string(),
                    error: error.to_string(),
                    attempts,
                });
                let state = TaskState::Failed {
                    error: error.to_string(),
                    attempts,
                };
                let failure = EngineError::TaskFailed {
                    task: name.to_string(),
                    attempts,
                    source: error,
                };
                (state, Some(failure))
            }
            TaskOutcome::Fatal(err) => {
                error!(task = %name, "{}", err);
                self.emit(ExecutionEvent::TaskFailed {
                    task: name.to_string(),
                    error: err.to_string(),
                    attempts: 0,
                });
                let state = TaskState::Failed {
                    error: err.to_string(),
                    attempts: 0,
                };
                (state, Some(err))
            }
        };

        let mut dispatch = self.dispatch();
        dispatch.running = dispatch.running.saturating_sub(1);
        dispatch.states.insert(name.to_string(), state);
        if let Some(err) = failure {
            dispatch.fail(err);
        }

        for dependent in self.graph.dependents(name) {
            let Some(degree) = dispatch.indegree.get_mut(dependent) else {
                continue;
            };
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                dispatch.push(dependent.clone());
            }
        }

        dispatch.completed += 1;
        if dispatch.completed == self.graph.len() {
            dispatch.close();
        } else if dispatch.running == 0 && dispatch.queued == 0 && dispatch.sender.is_some() {
            warn!(
                "no task is queued or running with {} of {} completed; stopping",
                dispatch.completed,
                self.graph.len()
            );
            dispatch.close();
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
