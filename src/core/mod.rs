//! Core domain models and the templating layer
//!
//! This module defines the pipeline and task models, the dependency graph,
//! the run-scoped context store, and the placeholder resolver and condition
//! evaluator that read from it.

pub mod condition;
pub mod config;
pub mod context;
pub mod graph;
pub mod pipeline;
pub mod resolver;
pub mod run_info;
pub mod state;
pub mod task;
pub mod value;

pub use condition::{ConditionError, ConditionOutcome};
pub use context::{event_values, EventValues, RunContext};
pub use graph::{Graph, GraphError};
pub use pipeline::*;
pub use resolver::{ResolveError, Resolver};
pub use run_info::RunInfo;
pub use state::*;
pub use task::*;
pub use value::ParamValue;

use std::collections::HashMap;

/// Outputs of the pre-scheduling deployment: service -> key -> value
pub type InfraOutputs = HashMap<String, HashMap<String, String>>;
