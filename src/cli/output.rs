//! CLI output formatting

use crate::{
    core::{RunStatus, TaskState},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a task state for display
pub fn format_task_state(state: &TaskState) -> String {
    let label = state.label();
    match state {
        TaskState::Pending | TaskState::Ready => style(label).dim().to_string(),
        TaskState::Running { attempt } | TaskState::Retrying { attempt } => {
            style(format!("{} (attempt {})", label, attempt)).yellow().to_string()
        }
        TaskState::Succeeded { .. } => style(label).green().to_string(),
        TaskState::Failed { .. } => style(label).red().to_string(),
        TaskState::Skipped { .. } => style(label).dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, tasks } => format!(
            "{} Starting run {} ({} tasks)",
            ROCKET,
            style(run_id).bold(),
            style(tasks).cyan()
        ),
        ExecutionEvent::TaskStarted { task, attempt } => {
            if *attempt > 1 {
                format!("{} {} (attempt {})", SPINNER, style(task).cyan(), style(attempt).dim())
            } else {
                format!("{} {}", SPINNER, style(task).cyan())
            }
        }
        ExecutionEvent::TaskRetrying {
            task,
            attempt,
            max_attempts,
            delay,
            error,
        } => format!(
            "{} {} attempt {}/{} failed, retrying in {:?}: {}",
            WARN,
            style(task).yellow(),
            attempt,
            max_attempts,
            delay,
            style(error).dim()
        ),
        ExecutionEvent::TaskSucceeded { task, attempts } => {
            if *attempts > 1 {
                format!("{} {} after {} attempts", CHECK, style(task).green(), attempts)
            } else {
                format!("{} {}", CHECK, style(task).green())
            }
        }
        ExecutionEvent::TaskSkipped { task, reason } => {
            format!("{} {} skipped: {}", SKIP, style(task).dim(), style(reason).dim())
        }
        ExecutionEvent::TaskFailed { task, error, .. } => {
            format!("{} {}: {}", CROSS, style(task).red(), style(error).dim())
        }
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(run_id).dim(),
            format_status(*status)
        ),
    }
}

/// Format an execution plan, one line per topological level
pub fn format_levels(levels: &[Vec<String>]) -> String {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| format!("  {} {}", style(format!("{}.", i + 1)).dim(), level.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}
