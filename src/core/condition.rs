//! `run_if` / `skip_if` condition evaluation

use crate::core::{
    resolver::{ResolveError, Resolver},
    task::Task,
};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while evaluating a condition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("invalid format for condition '{0}' (expected '<left> == <right>' or '<left> != <right>')")]
    InvalidFormat(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Whether a task should run, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub should_run: bool,
    pub reason: String,
}

impl ConditionOutcome {
    fn run(reason: impl Into<String>) -> Self {
        Self {
            should_run: true,
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_run: false,
            reason: reason.into(),
        }
    }
}

fn condition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\s*(==|!=)\s*(.+)$").expect("condition pattern is valid"))
}

/// Decide whether `task` runs
///
/// `run_if` wins when both `run_if` and `skip_if` are set.
pub fn evaluate(task: &Task, resolver: &Resolver<'_>) -> Result<ConditionOutcome, ConditionError> {
    if let Some(expr) = &task.run_if {
        return Ok(if evaluate_expression(expr, resolver)? {
            ConditionOutcome::run("'run_if' condition evaluated to 'true'")
        } else {
            ConditionOutcome::skip("'run_if' condition evaluated to 'false'")
        });
    }

    if let Some(expr) = &task.skip_if {
        return Ok(if evaluate_expression(expr, resolver)? {
            ConditionOutcome::skip("'skip_if' condition evaluated to 'true'")
        } else {
            ConditionOutcome::run("'skip_if' condition evaluated to 'false'")
        });
    }

    Ok(ConditionOutcome::run(""))
}

/// Evaluate a single `<left> (==|!=) <right>` comparison
pub fn evaluate_expression(expr: &str, resolver: &Resolver<'_>) -> Result<bool, ConditionError> {
    let caps = condition_re()
        .captures(expr.trim())
        .ok_or_else(|| ConditionError::InvalidFormat(expr.to_string()))?;

    let left = resolver.resolve_str(caps[1].trim())?;
    let right = resolver.resolve_str(caps[3].trim())?;

    Ok(match &caps[2] {
        "==" => left == right,
        _ => left != right,
    })
}
