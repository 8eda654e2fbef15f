use anyhow::{Context, Result};
use sluice::cli::commands::{RunCommand, ValidateCommand};
use sluice::cli::logging::init_logging;
use sluice::cli::output::*;
use sluice::cli::{Cli, Command};
use sluice::core::config::PipelineConfig;
use sluice::core::{Graph, RunInfo};
use sluice::execution::{ExecutionEngine, ExecutionEvent};
use sluice::infra::{InfraDeployer, NoopDeployer};
use sluice::services::ServiceRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.verbose).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, cli.verbose)?,
    }

    Ok(())
}

fn load_pipeline(file: &str, registry: &ServiceRegistry) -> Result<PipelineConfig> {
    let config = PipelineConfig::from_file(file)
        .with_context(|| format!("Failed to load pipeline config {}", file))?;
    config.validate_services(registry)?;
    Ok(config)
}

async fn run_pipeline(cmd: &RunCommand, verbose: bool) -> Result<()> {
    // Parsed first so `disable_logging` is known before validation logs anything
    let config = PipelineConfig::parse_file(&cmd.file)
        .with_context(|| format!("Failed to load pipeline config {}", cmd.file))?;

    let params: HashMap<String, String> = cmd.param.iter().cloned().collect();
    let run = RunInfo::generate(&cmd.file, params).context("Failed to prepare run directory")?;

    let log_file = (!config.disable_logging).then(|| run.log_path());
    init_logging(verbose, log_file.as_deref())?;

    let registry = ServiceRegistry::with_builtin_services();
    config
        .validate()
        .with_context(|| format!("Invalid pipeline config {}", cmd.file))?;
    config.validate_services(&registry)?;
    let pipeline = config.to_pipeline();

    println!(
        "{} Loaded pipeline: {} ({} tasks)",
        INFO,
        style(&pipeline.name).bold(),
        style(pipeline.tasks.len()).cyan()
    );
    for (key, value) in &run.params {
        println!("{} Parameter: {} = {}", INFO, style(key).cyan(), style(value).dim());
    }
    if let Some(path) = &log_file {
        println!("{} Logging to {}", INFO, style(path.display()).dim());
    }

    let infra = NoopDeployer
        .deploy(&pipeline.infrastructure)
        .await
        .context("Infrastructure deployment failed")?;

    let mut engine = ExecutionEngine::new(registry);
    if let Some(workers) = cmd.workers {
        engine = engine.with_workers(workers);
    }
    println!("{} Workers: {}", INFO, style(engine.workers()).cyan());

    let progress = create_progress_bar(pipeline.tasks.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_execution_event(&event));
        match &event {
            ExecutionEvent::TaskStarted { task, .. } => bar.set_message(task.clone()),
            ExecutionEvent::TaskSucceeded { .. }
            | ExecutionEvent::TaskSkipped { .. }
            | ExecutionEvent::TaskFailed { .. } => bar.inc(1),
            _ => {}
        }
    });

    println!();
    let result = engine
        .execute_with_report(&pipeline, Arc::new(run), Arc::new(infra))
        .await;
    progress.finish_and_clear();
    let report = result.context("Invalid pipeline graph")?;

    let mut names: Vec<_> = report.states.keys().collect();
    names.sort();

    match &report.failure {
        None => println!(
            "\n{} {} completed {} ({} succeeded, {} skipped)",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green(),
            report.succeeded(),
            report.skipped()
        ),
        Some(_) => println!(
            "\n{} {} {} ({} of {} tasks completed)",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red(),
            report.completed,
            report.total
        ),
    }
    for name in names {
        println!("  {} {}", style(name).bold(), format_task_state(&report.states[name]));
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&report.context.snapshot())?;
        println!("\n{}", json);
    }

    if let Err(e) = report.into_result() {
        error!("{:#}", anyhow::Error::from(e));
        std::process::exit(1);
    }
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand, verbose: bool) -> Result<()> {
    init_logging(verbose, None)?;
    println!("{} Validating pipeline...", INFO);

    let registry = ServiceRegistry::with_builtin_services();
    let result = load_pipeline(&cmd.file, &registry).and_then(|config| {
        let levels = Graph::build(&config.to_pipeline())?.levels();
        Ok((config, levels))
    });

    match result {
        Ok((config, levels)) => {
            if cmd.json {
                let data = serde_json::json!({
                    "name": config.name,
                    "tasks": config.tasks.len(),
                    "levels": levels,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
                return Ok(());
            }

            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Tasks: {}", style(config.tasks.len()).cyan());
            println!("  Execution plan:");
            println!("{}", format_levels(&levels));
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
