//! Operator CLI
//!
//! Runs one-off maintenance against the production database: trigger the due
//! scans by hand, inspect or cancel jobs, drain the queue without starting the
//! HTTP server. Results are printed as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use clipforge_core::common::{JobId, PipelineError};
use clipforge_core::domains::job_registry;
use clipforge_core::domains::scheduling::activities::{process_due_calendars, process_due_posts};
use clipforge_core::kernel::jobs::{EnqueueOptions, JobRunner, JobRunnerConfig, JobType};
use clipforge_core::server::{connect_database, production_deps};
use clipforge_core::Config;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clipforge_cli")]
#[command(about = "Clipforge operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish scheduled posts that are due now
    ScanPosts,

    /// Fire publishing calendars that are due now
    ScanCalendars,

    /// Show a job
    Job { id: String },

    /// Cancel a pending job
    Cancel { id: String },

    /// Enqueue a job with a JSON payload
    Enqueue {
        job_type: String,
        #[arg(long, default_value = "{}")]
        args: String,
        #[arg(long, default_value_t = 0)]
        priority: i16,
    },

    /// Run jobs until none is visible
    Drain,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_job_id(raw: &str) -> Result<JobId> {
    raw.parse()
        .map_err(|_| PipelineError::data(format!("invalid job id: {}", raw)).into())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,clipforge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = connect_database(&config).await?;
    let deps = production_deps(&config, pool)?;

    match cli.command {
        Commands::ScanPosts => {
            let summary = process_due_posts(&deps, Utc::now()).await?;
            print_json(&summary)?;
        }
        Commands::ScanCalendars => {
            let fired = process_due_calendars(&deps, Utc::now()).await?;
            print_json(&serde_json::json!({ "fired": fired }))?;
        }
        Commands::Job { id } => {
            let job_id = parse_job_id(&id)?;
            let job = deps
                .job_queue
                .find(job_id)
                .await?
                .ok_or_else(|| PipelineError::not_found("job", job_id))?;
            print_json(&job)?;
        }
        Commands::Cancel { id } => {
            let job_id = parse_job_id(&id)?;
            let cancelled = deps.job_queue.cancel(job_id).await?;
            print_json(&serde_json::json!({ "job_id": job_id, "cancelled": cancelled }))?;
        }
        Commands::Enqueue {
            job_type,
            args,
            priority,
        } => {
            let job_type: JobType = job_type.parse().map_err(PipelineError::data)?;
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let options = EnqueueOptions::builder().priority(priority).build();
            let job_id = deps.job_queue.enqueue_raw(job_type, args, options).await?;
            print_json(&serde_json::json!({ "job_id": job_id }))?;
        }
        Commands::Drain => {
            let runner = JobRunner::new(
                deps.job_queue.clone(),
                Arc::new(job_registry()),
                deps.clone(),
                JobRunnerConfig::default(),
            );
            let executed = runner.run_until_idle().await?;
            print_json(&serde_json::json!({ "executed": executed }))?;
        }
    }

    Ok(())
}
