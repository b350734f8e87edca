//! Wiring a configured job into a pipeline run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{JobConfig, SourceConfig};
use crate::error::{ConfigError, PipelineError};
use crate::ledger::CompletionLedger;
use crate::planner::{KeyLister, KeyPrefixPlanner, TimeWindowPlanner};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::runner::{PipelineRunner, RunSummary};
use crate::source::{ErddapSource, S3PrefixSource};
use crate::staging::StagingArea;
use crate::worker::{Destination, TransferWorker};

/// Local directories shared by all jobs.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub state_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl JobPaths {
    pub fn new(state_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// `{state_dir}/{job_id}.json`
    pub fn ledger_path(&self, job_id: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", job_id))
    }

    /// `{staging_dir}/{job_id}`
    pub fn staging_path(&self, job_id: &str) -> PathBuf {
        self.staging_dir.join(job_id)
    }
}

/// Run one job to the end of its plan.
#[instrument(skip_all, fields(job = %job.id()))]
pub async fn run_job(
    job: &JobConfig,
    paths: &JobPaths,
    destination: Arc<dyn Destination>,
) -> Result<RunSummary, PipelineError> {
    let policy = job.retry_policy()?;
    let ledger = CompletionLedger::load(paths.ledger_path(job.id())).await?;
    let staging = StagingArea::create(paths.staging_path(job.id())).await?;

    info!(
        name = %job.job.name,
        completed = ledger.len(),
        destination = %destination.name(),
        "Starting job"
    );

    match &job.source {
        SourceConfig::Erddap(erddap) => {
            let source = Arc::new(ErddapSource::new(erddap.clone(), job.staging.time_chunk)?);
            let worker = TransferWorker::new(
                source,
                destination,
                staging,
                policy,
                job.destination.prefix.as_str(),
            );
            let mut runner = PipelineRunner::new(worker, ledger);

            let window = job.window.as_ref().ok_or_else(|| ConfigError::Invalid {
                job: job.id().to_string(),
                reason: "erddap source requires a window".to_string(),
            })?;
            let domain = window.time_range()?;
            runner.run(domain, window.granularity, job.bbox).await
        }
        SourceConfig::S3Prefix(s3) => {
            let mut source = S3PrefixSource::anonymous(&s3.bucket, &s3.region).await;
            if let Some(bbox) = job.bbox {
                source = source.with_subset(bbox, job.staging.time_chunk);
            }
            let source = Arc::new(source);
            let planner = KeyPrefixPlanner::new(s3.prefix.as_str(), s3.suffix.clone());
            let worker = TransferWorker::new(
                source.clone(),
                destination,
                staging,
                policy,
                job.destination.prefix.as_str(),
            );
            let mut runner = PipelineRunner::new(worker, ledger);
            run_key_prefix(source.as_ref(), &planner, &mut runner, &policy).await
        }
    }
}

/// List the source under retry, then run every listed object.
pub async fn run_key_prefix(
    lister: &dyn KeyLister,
    planner: &KeyPrefixPlanner,
    runner: &mut PipelineRunner,
    policy: &RetryPolicy,
) -> Result<RunSummary, PipelineError> {
    let chunks = run_with_retry(policy, "list", || planner.plan(lister)).await?;
    runner.run_chunks(chunks).await
}

/// Planned and completed chunk counts for status output.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub completed: usize,
    /// Known only for windowed jobs; key-prefix jobs need a listing.
    pub planned: Option<usize>,
    pub last_completed: Option<String>,
}

/// Read a job's ledger without touching the network.
pub async fn job_progress(job: &JobConfig, ledger_path: &Path) -> Result<JobProgress, PipelineError> {
    let ledger = CompletionLedger::load(ledger_path).await?;

    let planned = match (&job.source, &job.window) {
        (SourceConfig::Erddap(_), Some(window)) => {
            let planner =
                TimeWindowPlanner::new(window.time_range()?, window.granularity, job.bbox)?;
            Some(planner.chunks().count())
        }
        _ => None,
    };

    Ok(JobProgress {
        completed: ledger.len(),
        planned,
        last_completed: ledger.iter().last().map(|id| id.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths() {
        let paths = JobPaths::new("/var/lib/ocean/state", "/tmp/staging");
        assert_eq!(
            paths.ledger_path("copernicus-japan"),
            PathBuf::from("/var/lib/ocean/state/copernicus-japan.json")
        );
        assert_eq!(
            paths.staging_path("copernicus-japan"),
            PathBuf::from("/tmp/staging/copernicus-japan")
        );
    }

    #[tokio::test]
    async fn test_progress_of_windowed_job() {
        let yaml = r#"
job:
  id: progress
  name: Progress
source:
  type: erddap
  base_url: http://localhost:1/erddap
  dataset_id: ds
  variables: [VHM0]
window:
  start: "2020-01-01"
  end: "2020-07-01"
  granularity:
    months: 1
"#;
        let job = JobConfig::from_yaml(yaml).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let ledger_path = dir.path().join("progress.json");
        std::fs::write(&ledger_path, r#"["20200101_20200201", "20200201_20200301"]"#).unwrap();

        let progress = job_progress(&job, &ledger_path).await.unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.planned, Some(6));
        assert_eq!(progress.last_completed.as_deref(), Some("20200201_20200301"));
    }
}
