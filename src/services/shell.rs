//! Shell service - runs a command through `sh -c`

use crate::core::{EventValues, InfraOutputs, ParamValue, Resolver, RunContext, RunInfo, Task};
use crate::services::{record_outcome, Service, ServiceError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs the `command` parameter in the run directory
///
/// Records `exit_code` and the trimmed `stdout` alongside `success`.
/// An optional integer `timeout_secs` parameter bounds each attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellService;

impl ShellService {
    async fn execute(
        &self,
        task: &Task,
        resolver: &Resolver<'_>,
        run: &RunInfo,
        values: &mut EventValues,
    ) -> Result<(), ServiceError> {
        let command = resolver.resolve_str(task.string_parameter("command")?)?;
        debug!(%command, "spawning shell");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command).kill_on_drop(true);
        if run.run_dir.is_dir() {
            cmd.current_dir(&run.run_dir);
        }

        let output = match timeout_secs(task)? {
            Some(secs) => timeout(Duration::from_secs(secs), cmd.output())
                .await
                .map_err(|_| ServiceError::Timeout(secs))??,
            None => cmd.output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines() {
            info!(target: "sluice::shell", "{}", line);
        }
        for line in stderr.lines() {
            warn!(target: "sluice::shell", "{}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        values.insert("exit_code".to_string(), code.to_string());
        values.insert("stdout".to_string(), stdout.trim().to_string());

        if !output.status.success() {
            return Err(ServiceError::CommandFailed {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

fn timeout_secs(task: &Task) -> Result<Option<u64>, ServiceError> {
    match task.parameter("timeout_secs") {
        None => Ok(None),
        Some(ParamValue::Integer(secs)) if *secs > 0 => Ok(Some(*secs as u64)),
        Some(other) => Err(ServiceError::InvalidParameter {
            name: "timeout_secs".to_string(),
            reason: format!("expected a positive integer, got {}", other),
        }),
    }
}

#[async_trait]
impl Service for ShellService {
    fn name(&self) -> &str {
        "shell"
    }

    fn required_parameters(&self) -> &[&'static str] {
        &["command"]
    }

    async fn run(
        &self,
        task: &Task,
        task_name: &str,
        context: &RunContext,
        infra: &InfraOutputs,
        run: &RunInfo,
    ) -> Result<(), ServiceError> {
        let resolver = Resolver::new(context, infra, run);
        let mut values = EventValues::new();
        let result = self.execute(task, &resolver, run, &mut values).await;
        record_outcome(context, task_name, values, result)
    }
}
