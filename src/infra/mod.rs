//! Infrastructure deployment run once before scheduling
//!
//! Provisioning itself is left to deployers outside this crate; the engine
//! only consumes the outputs they produce.

use crate::core::InfraOutputs;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// One deployment declared under a pipeline's `infrastructure` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment backend, e.g. `terraform`
    pub service: String,

    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default, rename = "var-file", skip_serializing_if = "Option::is_none")]
    pub var_file: Option<String>,
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("deployment '{name}' failed: {message}")]
    Deployment { name: String, message: String },
}

/// Turns declared deployments into the outputs tasks read via `${infra:...}`
#[async_trait]
pub trait InfraDeployer: Send + Sync {
    async fn deploy(
        &self,
        deployments: &HashMap<String, Deployment>,
    ) -> Result<InfraOutputs, InfraError>;
}

/// Deploys nothing; every `${infra:...}` lookup resolves empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDeployer;

#[async_trait]
impl InfraDeployer for NoopDeployer {
    async fn deploy(
        &self,
        deployments: &HashMap<String, Deployment>,
    ) -> Result<InfraOutputs, InfraError> {
        for (name, deployment) in deployments {
            warn!(
                deployment = %name,
                service = %deployment.service,
                "no deployer configured; skipping infrastructure deployment"
            );
        }
        Ok(InfraOutputs::new())
    }
}

/// Hands out a fixed set of outputs, e.g. ones computed by an earlier run
#[derive(Debug, Clone, Default)]
pub struct StaticInfra {
    outputs: InfraOutputs,
}

impl StaticInfra {
    pub fn new(outputs: InfraOutputs) -> Self {
        Self { outputs }
    }
}

#[async_trait]
impl InfraDeployer for StaticInfra {
    async fn deploy(
        &self,
        _deployments: &HashMap<String, Deployment>,
    ) -> Result<InfraOutputs, InfraError> {
        Ok(self.outputs.clone())
    }
}
