//! Sequential driver over a chunk plan.

use ocean_common::{BoundingBox, TimeRange};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunk::{ChunkDescriptor, ChunkId};
use crate::error::PipelineError;
use crate::ledger::CompletionLedger;
use crate::planner::{Granularity, TimeWindowPlanner};
use crate::worker::TransferWorker;

/// Counts for one pass over a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub planned: usize,
    pub skipped: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes_uploaded: u64,
    pub failed_chunks: Vec<ChunkId>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Feeds planned chunks to a worker one at a time, skipping completed ones.
pub struct PipelineRunner {
    worker: TransferWorker,
    ledger: CompletionLedger,
}

impl PipelineRunner {
    pub fn new(worker: TransferWorker, ledger: CompletionLedger) -> Self {
        Self { worker, ledger }
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> CompletionLedger {
        self.ledger
    }

    /// Plan `domain` into windows of `granularity` and process them.
    pub async fn run(
        &mut self,
        domain: TimeRange,
        granularity: Granularity,
        bbox: Option<BoundingBox>,
    ) -> Result<RunSummary, PipelineError> {
        let planner = TimeWindowPlanner::new(domain, granularity, bbox)?;
        info!(domain = %domain, granularity = %granularity, "Starting windowed run");
        self.run_chunks(planner.chunks()).await
    }

    /// Process `chunks` in order.
    ///
    /// Chunk failures are logged and counted; a ledger failure aborts the run.
    pub async fn run_chunks<I>(&mut self, chunks: I) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = ChunkDescriptor>,
    {
        let mut summary = RunSummary::default();

        for chunk in chunks {
            summary.planned += 1;
            let id = chunk.id();

            if self.ledger.is_complete(&id) {
                info!(chunk = %id, "Skipping already completed chunk {}", id);
                summary.skipped += 1;
                continue;
            }

            match self.worker.process(&chunk, &mut self.ledger).await {
                Ok(report) => {
                    summary.completed += 1;
                    summary.bytes_uploaded += report.bytes;
                }
                Err(e) if e.is_run_fatal() => {
                    error!(chunk = %id, error = %e, "Fatal chunk error, aborting run");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(chunk = %id, error = %e, "Chunk failed, continuing with next chunk");
                    summary.failed += 1;
                    summary.failed_chunks.push(id);
                }
            }
        }

        if summary.is_success() {
            info!(
                planned = summary.planned,
                skipped = summary.skipped,
                completed = summary.completed,
                bytes = summary.bytes_uploaded,
                "All chunks downloaded and uploaded successfully."
            );
        } else {
            warn!(
                planned = summary.planned,
                skipped = summary.skipped,
                completed = summary.completed,
                failed = summary.failed,
                "Run finished with failed chunks; rerun to retry them."
            );
        }

        Ok(summary)
    }
}
