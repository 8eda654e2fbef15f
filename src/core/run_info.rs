//! Per-run identity and parameters

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Identity of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    /// Unique run id (`YYYYMMDDTHHMMSSZ_xxxxxxxx`)
    pub run_id: String,

    /// Ephemeral working directory for this run
    pub run_dir: PathBuf,

    /// Pipeline name derived from the file reference
    pub pipeline: String,

    /// Where the pipeline definition came from
    pub file_ref: String,

    /// Run-level parameters supplied at trigger time
    pub params: HashMap<String, String>,
}

impl RunInfo {
    /// Create run info for a pipeline, allocating a run id and directory
    pub fn generate(file_ref: &str, params: HashMap<String, String>) -> std::io::Result<Self> {
        let run_id = new_run_id();
        let run_dir = std::env::temp_dir().join(format!("sluice-run-{}", run_id));
        std::fs::create_dir_all(&run_dir)?;

        Ok(Self {
            run_id,
            run_dir,
            pipeline: pipeline_name(file_ref),
            file_ref: file_ref.to_string(),
            params,
        })
    }

    /// Run info rooted at an existing directory, without touching the filesystem
    pub fn in_dir(run_dir: impl Into<PathBuf>, params: HashMap<String, String>) -> Self {
        Self {
            run_id: new_run_id(),
            run_dir: run_dir.into(),
            params,
            ..Self::default()
        }
    }

    /// Look up a run parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Where the per-run JSON log is written
    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join("logs").join(format!("{}.jsonl", self.run_id))
    }
}

fn new_run_id() -> String {
    let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", ts, &suffix[..8])
}

fn pipeline_name(file_ref: &str) -> String {
    let trimmed = file_ref.strip_prefix("local://").unwrap_or(file_ref);
    let file = trimmed.rsplit('/').next().unwrap_or(trimmed);
    file.strip_suffix(".yaml")
        .or_else(|| file.strip_suffix(".yml"))
        .unwrap_or(file)
        .to_string()
}
