//! Task domain model

use crate::core::{config::TaskConfig, value::ParamValue};
use std::collections::BTreeMap;
use std::time::Duration;

/// Attempts made when a task has no retry policy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Pause between attempts when a retry policy leaves the delay unset
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A single task in a pipeline
///
/// The task's name is the key it is stored under in [`crate::core::Pipeline::tasks`].
#[derive(Debug, Clone, Default)]
pub struct Task {
    /// Name of the service that executes this task
    pub service: String,

    /// Names of the tasks this task depends on, in declaration order
    pub dependencies: Vec<String>,

    /// Run only when this expression holds
    pub run_if: Option<String>,

    /// Skip when this expression holds
    pub skip_if: Option<String>,

    /// Service parameters, possibly containing placeholders
    pub parameters: BTreeMap<String, ParamValue>,

    /// Retry policy (None = single attempt)
    pub retry: Option<RetryPolicy>,

    /// External resource identifiers referenced by this task
    pub resources: Vec<String>,
}

/// How often, and how patiently, a failing task is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub delay: Option<Duration>,
}

impl Task {
    /// Create a task bound to a service
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Task {
            service: config.service.clone(),
            dependencies: config.dependencies.clone(),
            run_if: config.run_if.clone().filter(|s| !s.trim().is_empty()),
            skip_if: config.skip_if.clone().filter(|s| !s.trim().is_empty()),
            parameters: config.parameters.clone(),
            retry: config.retry.as_ref().map(|r| RetryPolicy {
                max_attempts: r.max_attempts,
                delay: r.delay_secs.map(Duration::from_secs),
            }),
            resources: config.resources.clone(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_run_if(mut self, expr: impl Into<String>) -> Self {
        self.run_if = Some(expr.into());
        self
    }

    pub fn with_skip_if(mut self, expr: impl Into<String>) -> Self {
        self.skip_if = Some(expr.into());
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.retry = Some(RetryPolicy {
            max_attempts: Some(max_attempts),
            delay: Some(delay),
        });
        self
    }

    /// Total number of attempts allowed, never less than one
    pub fn max_attempts(&self) -> u32 {
        self.retry
            .and_then(|r| r.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1)
    }

    /// Delay before each attempt after the first
    pub fn retry_delay(&self) -> Duration {
        self.retry
            .and_then(|r| r.delay)
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }

    /// Look up a raw (unresolved) parameter
    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Look up a parameter that must be a string
    pub fn string_parameter(&self, key: &str) -> Result<&str, ParameterError> {
        match self.parameters.get(key) {
            None => Err(ParameterError::Missing(key.to_string())),
            Some(ParamValue::String(s)) => Ok(s),
            Some(other) => Err(ParameterError::WrongType {
                name: key.to_string(),
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

/// Error returned by typed parameter accessors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("missing parameter '{0}'")]
    Missing(String),

    #[error("parameter '{name}' must be a {expected}, got {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}
