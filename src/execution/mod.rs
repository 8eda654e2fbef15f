//! Pipeline execution engine

pub mod engine;

pub use engine::{EngineError, EventHandler, ExecutionEngine, ExecutionEvent, RunReport};
