//! Wait service - sleeps for a fixed duration

use crate::core::{EventValues, InfraOutputs, Resolver, RunContext, RunInfo, Task};
use crate::services::{record_outcome, Service, ServiceError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct WaitService;

#[async_trait]
impl Service for WaitService {
    fn name(&self) -> &str {
        "wait"
    }

    fn required_parameters(&self) -> &[&'static str] {
        &["duration"]
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
        let result = async {
            let raw = resolver.resolve_str(task.string_parameter("duration")?)?;
            let duration = parse_duration(&raw).ok_or_else(|| ServiceError::InvalidParameter {
                name: "duration".to_string(),
                reason: format!("invalid duration '{}' (use a format like 500ms, 5s, 1m)", raw),
            })?;

            info!("Waiting for {:?}", duration);
            tokio::time::sleep(duration).await;
            Ok::<(), ServiceError>(())
        }
        .await;

        record_outcome(context, task_name, EventValues::new(), result)
    }
}

/// Parse `<number><unit>` with unit one of `ms`, `s`, `m`, `h`
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let (number, unit) = input.split_at(split);
    let value: f64 = number.parse().ok()?;

    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return None,
    };

    Duration::try_from_secs_f64(secs).ok()
}
