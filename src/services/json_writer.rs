//! JSON writer service - writes a resolved data map to the run directory

use crate::core::{EventValues, InfraOutputs, ParamValue, Resolver, RunContext, RunInfo, Task};
use crate::services::{record_outcome, Service, ServiceError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Writes `data` as pretty JSON to `<run_dir>/job_outputs/<task>/<file_name>.json`
///
/// Records the output directory as `json_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriterService;

impl JsonWriterService {
    async fn execute(
        &self,
        task: &Task,
        task_name: &str,
        resolver: &Resolver<'_>,
        run: &RunInfo,
        values: &mut EventValues,
    ) -> Result<(), ServiceError> {
        let mut file_name = resolver.resolve_str(task.string_parameter("file_name")?)?;
        if !file_name.ends_with(".json") {
            file_name.push_str(".json");
        }

        let data = match task.parameter("data") {
            Some(data @ ParamValue::Map(_)) => resolver.resolve_value(data)?,
            Some(other) => {
                return Err(ServiceError::InvalidParameter {
                    name: "data".to_string(),
                    reason: format!("expected a map, got {}", other.kind()),
                })
            }
            None => return Err(crate::core::ParameterError::Missing("data".to_string()).into()),
        };

        let dir: PathBuf = run.run_dir.join("job_outputs").join(task_name);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(&file_name);
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| ServiceError::Failed(format!("encoding json: {}", e)))?;
        tokio::fs::write(&path, json).await?;

        info!("Wrote {}", path.display());
        values.insert("json_path".to_string(), dir.display().to_string());
        Ok(())
    }
}

#[async_trait]
impl Service for JsonWriterService {
    fn name(&self) -> &str {
        "json_writer"
    }

    fn required_parameters(&self) -> &[&'static str] {
        &["file_name", "data"]
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
        let result = self.execute(task, task_name, &resolver, run, &mut values).await;
        record_outcome(context, task_name, values, result)
    }
}
