//! Pipeline domain model

use crate::core::{config::PipelineConfig, task::Task};
use crate::infra::Deployment;
use std::collections::HashMap;

/// A pipeline definition
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Tasks keyed by their unique name
    pub tasks: HashMap<String, Task>,

    /// Deployments to run before scheduling
    pub infrastructure: HashMap<String, Deployment>,

    /// Whether the per-run log file is disabled
    pub disable_logging: bool,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let tasks = config
            .tasks
            .iter()
            .map(|(name, task_config)| (name.clone(), Task::from_config(task_config)))
            .collect();

        Pipeline {
            name: config.name.clone(),
            tasks,
            infrastructure: config.infrastructure.clone(),
            disable_logging: config.disable_logging,
        }
    }

    /// Add a task under the given name, replacing any previous one
    pub fn with_task(mut self, name: impl Into<String>, task: Task) -> Self {
        self.tasks.insert(name.into(), task);
        self
    }

    /// Get a task by name
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Sorted task names
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
