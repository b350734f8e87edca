//! Ocean dataset downloader.
//!
//! Runs configured transfer jobs chunk by chunk with:
//! - Fixed-delay retry of fetch, staging and upload
//! - A per-job completion ledger so restarts skip finished chunks
//! - Wave power summaries of staged grids

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use downloader::job::job_progress;
use downloader::report::summarize_staged_grid;
use downloader::{load_job_configs, run_job, JobConfig, JobPaths, SourceConfig};
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Chunked, resumable ocean dataset downloader")]
struct Args {
    /// Configuration directory (contains jobs/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Directory for completion ledgers
    #[arg(long, env = "STATE_DIR", default_value = "state", global = true)]
    state_dir: PathBuf,

    /// Directory for staged chunk files
    #[arg(long, env = "STAGING_DIR", default_value = "./temp_downloads", global = true)]
    staging_dir: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run enabled jobs until their plans are exhausted
    Run {
        /// Specific job to run (default: all enabled)
        #[arg(short, long)]
        job: Option<String>,
    },
    /// Show ledger progress per job
    Status {
        #[arg(short, long)]
        job: Option<String>,
    },
    /// List configured jobs
    Jobs,
    /// Compute wave power statistics for a staged grid file
    Summarize {
        path: PathBuf,
        #[arg(long, default_value = "Unnamed region")]
        region: String,
        /// Number of top sites to rank
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

fn select_jobs(jobs: Vec<JobConfig>, wanted: Option<&str>) -> Result<Vec<JobConfig>> {
    match wanted {
        None => Ok(jobs),
        Some(id) => {
            let selected: Vec<_> = jobs.into_iter().filter(|j| j.id() == id).collect();
            if selected.is_empty() {
                bail!("No enabled job named '{}'", id);
            }
            Ok(selected)
        }
    }
}

async fn run(args: &Args, wanted: Option<&str>) -> Result<()> {
    let jobs = select_jobs(load_job_configs(&args.config_dir)?, wanted)?;
    let paths = JobPaths::new(&args.state_dir, &args.staging_dir);

    let mut failed_chunks = 0;
    for job in &jobs {
        let storage = ObjectStorage::new(&ObjectStorageConfig::from_env(&job.destination.bucket))
            .with_context(|| format!("Failed to connect to bucket {}", job.destination.bucket))?;

        let summary = run_job(job, &paths, Arc::new(storage))
            .await
            .with_context(|| format!("Job {} aborted", job.id()))?;

        info!(
            job = %job.id(),
            planned = summary.planned,
            skipped = summary.skipped,
            completed = summary.completed,
            failed = summary.failed,
            "Job finished"
        );
        failed_chunks += summary.failed;
    }

    if failed_chunks > 0 {
        bail!("{} chunk(s) failed; rerun to retry them", failed_chunks);
    }
    Ok(())
}

async fn status(args: &Args, wanted: Option<&str>) -> Result<()> {
    let jobs = select_jobs(load_job_configs(&args.config_dir)?, wanted)?;
    let paths = JobPaths::new(&args.state_dir, &args.staging_dir);

    for job in &jobs {
        let ledger_path = paths.ledger_path(job.id());
        let progress = job_progress(job, &ledger_path).await?;
        let planned = progress
            .planned
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<24} {:>6} / {:<6} last: {}",
            job.id(),
            progress.completed,
            planned,
            progress.last_completed.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn list_jobs(args: &Args) -> Result<()> {
    for job in load_job_configs(&args.config_dir)? {
        let source = match &job.source {
            SourceConfig::Erddap(e) => format!("erddap {}", e.dataset_id),
            SourceConfig::S3Prefix(s) => format!("s3://{}/{}", s.bucket, s.prefix),
        };
        println!(
            "{:<24} {:<48} -> s3://{}/{}",
            job.id(),
            source,
            job.destination.bucket,
            job.destination.prefix
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let result = match &args.command {
        Command::Run { job } => run(&args, job.as_deref()).await,
        Command::Status { job } => status(&args, job.as_deref()).await,
        Command::Jobs => list_jobs(&args),
        Command::Summarize { path, region, top } => {
            let report = summarize_staged_grid(path, region, *top)
                .with_context(|| format!("Failed to summarize {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "Downloader failed");
    }
    result
}
