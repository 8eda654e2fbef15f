//! sluice - a dependency-driven pipeline orchestrator

pub mod cli;
pub mod core;
pub mod execution;
pub mod infra;
pub mod services;

// Re-export commonly used types
pub use core::{Graph, Pipeline, RunContext, RunInfo, Task, TaskState};
pub use execution::{EngineError, ExecutionEngine, ExecutionEvent, RunReport};
pub use infra::{InfraDeployer, NoopDeployer};
pub use services::{Service, ServiceError, ServiceRegistry};
