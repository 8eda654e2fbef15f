//! Pipeline configuration from YAML

use crate::core::{value::ParamValue, Pipeline};
use crate::infra::Deployment;
use crate::services::ServiceRegistry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Skip writing the per-run JSON log file
    #[serde(default)]
    pub disable_logging: bool,

    /// Deployments run once before scheduling; their outputs feed `${infra:...}`
    #[serde(default)]
    pub infrastructure: HashMap<String, Deployment>,

    /// Tasks keyed by name
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

/// Task configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Service that executes the task
    pub service: String,

    /// Tasks that must reach a terminal state first
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<String>,

    /// Service parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Referenced external resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

/// Retry policy configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first (default 1)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts (default 5)
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

impl PipelineConfig {
    /// Load and validate pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Self::parse(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without validating it
    ///
    /// Lets callers install logging (which depends on `disable_logging`)
    /// before [`validate`](Self::validate) reports anything.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse YAML without validating it
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Tasks that set both `run_if` and `skip_if`, sorted
    pub fn conflicting_conditions(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.run_if.is_some() && task.skip_if.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Validate the structure of the pipeline configuration
    ///
    /// Cycles are reported by [`crate::core::Graph::build`], which also runs
    /// before every execution.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.tasks.is_empty() {
            anyhow::bail!("Pipeline '{}' defines no tasks", self.name);
        }

        for name in self.conflicting_conditions() {
            warn!(
                task = %name,
                "both run_if and skip_if are set; run_if takes precedence"
            );
        }

        for (name, task) in &self.tasks {
            if task.service.trim().is_empty() {
                anyhow::bail!("Task '{}' does not name a service", name);
            }

            for dep in &task.dependencies {
                if dep == name {
                    anyhow::bail!("Task '{}' depends on itself", name);
                }
                if !self.tasks.contains_key(dep) {
                    anyhow::bail!("Task '{}' depends on non-existent task '{}'", name, dep);
                }
            }

            if let Some(retry) = &task.retry {
                if retry.max_attempts == Some(0) {
                    anyhow::bail!("Task '{}' retry.max_attempts must be at least 1", name);
                }
            }
        }

        Ok(())
    }

    /// Check every task against the services that will execute it
    pub fn validate_services(&self, registry: &ServiceRegistry) -> Result<()> {
        for (name, task) in &self.tasks {
            let service = match registry.get(&task.service) {
                Some(service) => service,
                None => anyhow::bail!(
                    "Task '{}' uses unknown service '{}' (available: {})",
                    name,
                    task.service,
                    registry.names().join(", ")
                ),
            };

            for required in service.required_parameters() {
                if !task.parameters.contains_key(*required) {
                    anyhow::bail!(
                        "Task '{}' is missing parameter '{}' required by service '{}'",
                        name,
                        required,
                        task.service
                    );
                }
            }
        }

        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
