//! Services - the pluggable executors that perform a task's actual effect

pub mod json_writer;
pub mod registry;
pub mod shell;
pub mod wait;

use crate::core::{
    EventValues, InfraOutputs, ParameterError, ResolveError, RunContext, RunInfo, Task,
};
use async_trait::async_trait;
use thiserror::Error;

pub use json_writer::JsonWriterService;
pub use registry::ServiceRegistry;
pub use shell::ShellService;
pub use wait::WaitService;

/// Error types for service execution
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command exited with status {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("service panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Trait for task executors - allows for different implementations
///
/// The engine runs each invocation inside a `task{name=...}` tracing span,
/// so services log with the plain `tracing` macros.
#[async_trait]
pub trait Service: Send + Sync {
    /// Name tasks use to select this service
    fn name(&self) -> &str;

    /// Parameters a task must supply; checked when a pipeline is loaded
    fn required_parameters(&self) -> &[&'static str] {
        &[]
    }

    /// Execute one attempt of `task`, recording outputs under `task_name`
    async fn run(
        &self,
        task: &Task,
        task_name: &str,
        context: &RunContext,
        infra: &InfraOutputs,
        run: &RunInfo,
    ) -> Result<(), ServiceError>;
}

/// Write a service's outputs once, with `success` reflecting `result`
pub(crate) fn record_outcome<T>(
    context: &RunContext,
    task_name: &str,
    mut values: EventValues,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    values.insert("success".to_string(), result.is_ok().to_string());
    context.set_event_values(task_name, values);
    result
}
