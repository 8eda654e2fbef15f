//! Execution state models

use serde::{Deserialize, Serialize};

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every task reached a terminal state without a fatal failure
    Succeeded,
    /// A fatal condition stopped the run
    Failed,
}

/// State of a single task within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for dependencies
    Pending,
    /// All dependencies are terminal; queued for a worker
    Ready,
    /// A worker is executing the given attempt
    Running { attempt: u32 },
    /// The given attempt failed; waiting out the retry delay
    Retrying { attempt: u32 },
    /// Condition evaluation decided not to run the task
    Skipped { reason: String },
    /// The service succeeded
    Succeeded { attempts: u32 },
    /// All attempts failed
    Failed { error: String, attempts: u32 },
}

impl TaskState {
    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Skipped { .. } | TaskState::Succeeded { .. } | TaskState::Failed { .. }
        )
    }

    /// Short uppercase label for display
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Ready => "READY",
            TaskState::Running { .. } => "RUNNING",
            TaskState::Retrying { .. } => "RETRYING",
            TaskState::Skipped { .. } => "SKIPPED",
            TaskState::Succeeded { .. } => "SUCCEEDED",
            TaskState::Failed { .. } => "FAILED",
        }
    }
}
