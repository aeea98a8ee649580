//! RowFlow - Command Line Entry Point
//!
//! Reads lines from stdin as single-column rows, runs a job over them and
//! prints the analyzer results and run summary as JSON.
//!
//! Without `--job`, the built-in job splits every line into tokens and
//! reports the token distribution and counts.

use anyhow::{bail, Context};
use clap::Parser;
use rowflow_rs::config::EngineConfig;
use rowflow_rs::pipeline::{
    ColumnDescriptor, ComponentDefinition, ComponentRegistry, ExecutionPlanBuilder, JobConfig,
    JobDefinition, LineSource, LogProgress, RowProcessingPublisher,
};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "rowflow", version, about = "Run a row-processing job over stdin")]
struct Cli {
    /// Engine config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Job definition as JSON; its first source column receives the lines
    #[arg(short, long)]
    job: Option<PathBuf>,

    /// Token delimiter of the built-in job
    #[arg(short, long, default_value = ";")]
    delimiter: String,

    /// Override the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// List the available component kinds and exit
    #[arg(long)]
    list_components: bool,
}

fn default_job(registry: &ComponentRegistry, delimiter: &str) -> anyhow::Result<JobDefinition> {
    let mut job = JobDefinition::new(vec![ColumnDescriptor::text("line")]);
    job.add(
        ComponentDefinition::new(
            "tokens",
            registry.create("token_splitter", serde_json::json!({ "delimiter": delimiter }))?,
        )
        .input("line"),
    );
    job.add(
        ComponentDefinition::new("lines", registry.create("row_count", serde_json::Value::Null)?)
            .input("line"),
    );
    job.add(
        ComponentDefinition::new("token count", registry.create("row_count", serde_json::Value::Null)?)
            .input("line (token)"),
    );
    job.add(
        ComponentDefinition::new(
            "token distribution",
            registry.create("value_distribution", serde_json::Value::Null)?,
        )
        .input("line (token)"),
    );
    Ok(job)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load_or_default(None),
    };
    if let Some(workers) = cli.workers {
        config.execution.worker_count = workers;
    }
    config.validate()?;

    let _log_guard = rowflow_rs::logging::init(&config.logging);
    tracing::info!("Starting rowflow");

    let registry = ComponentRegistry::with_builtins();

    if cli.list_components {
        let descriptors: Vec<_> = registry.descriptors().collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let job = match &cli.job {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read job {}", path.display()))?;
            JobConfig::from_json_str(&text)?.build(&registry)?
        }
        None => default_job(&registry, &cli.delimiter)?,
    };
    if job.source_columns().is_empty() {
        bail!("the job declares no source columns");
    }

    let plan = ExecutionPlanBuilder::build(&job)?;
    let mut source = LineSource::new(BufReader::new(std::io::stdin()));

    let outcome = RowProcessingPublisher::new(&plan)
        .with_config(config.execution.clone())
        .with_progress(Arc::new(LogProgress))
        .run(&mut source);

    match outcome {
        Ok(result) => {
            let output = serde_json::json!({
                "results": result.results.finalize_all()?,
                "summary": result.summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.report)?);
            Err(failure.into())
        }
    }
}
