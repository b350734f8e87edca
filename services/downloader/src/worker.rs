//! Processing of a single chunk: fetch, stage, upload, then commit.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ocean_common::OceanResult;
use storage::ObjectStorage;
use tracing::{info, instrument, warn};

use crate::chunk::{ChunkDescriptor, ChunkId};
use crate::error::ChunkError;
use crate::ledger::CompletionLedger;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::source::DatasetSource;
use crate::staging::StagingArea;

/// Object store the staged artifacts are uploaded to.
#[async_trait]
pub trait Destination: Send + Sync {
    fn name(&self) -> String;

    /// Upload a local file to `key`. Returns bytes uploaded.
    async fn put_file(&self, key: &str, local: &Path) -> OceanResult<u64>;

    async fn list(&self, prefix: &str) -> OceanResult<Vec<String>>;
}

#[async_trait]
impl Destination for ObjectStorage {
    fn name(&self) -> String {
        format!("s3://{}", self.bucket())
    }

    async fn put_file(&self, key: &str, local: &Path) -> OceanResult<u64> {
        ObjectStorage::put_file(self, key, local).await
    }

    async fn list(&self, prefix: &str) -> OceanResult<Vec<String>> {
        ObjectStorage::list(self, prefix).await
    }
}

/// Outcome of a successfully processed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub chunk: ChunkId,
    pub key: String,
    pub bytes: u64,
}

/// Moves one chunk at a time from a source to a destination.
pub struct TransferWorker {
    source: Arc<dyn DatasetSource>,
    destination: Arc<dyn Destination>,
    staging: StagingArea,
    retry: RetryPolicy,
    key_prefix: String,
}

impl TransferWorker {
    pub fn new(
        source: Arc<dyn DatasetSource>,
        destination: Arc<dyn Destination>,
        staging: StagingArea,
        retry: RetryPolicy,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            staging,
            retry,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Fetch, stage and upload `chunk`, then record it in `ledger`.
    ///
    /// The staged artifact is removed on every path. The ledger is only
    /// written after the upload succeeded and the artifact is gone.
    #[instrument(skip(self, chunk, ledger), fields(chunk = %chunk.id()))]
    pub async fn process(
        &self,
        chunk: &ChunkDescriptor,
        ledger: &mut CompletionLedger,
    ) -> Result<ChunkReport, ChunkError> {
        let id = chunk.id();
        let ext = self.source.artifact_extension(chunk);
        let artifact = self.staging.artifact_path(&id, &ext);
        let key = chunk.destination_key(&self.key_prefix, &ext);

        info!(source = %self.source.name(), "Processing chunk {}", chunk);

        let bytes = match self.transfer(chunk, &id, &artifact, &key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = self.staging.discard(&artifact).await {
                    warn!(error = %cleanup, "Could not remove artifact of failed chunk");
                }
                return Err(e);
            }
        };

        self.staging
            .discard(&artifact)
            .await
            .map_err(|source| ChunkError::Cleanup {
                chunk: id.clone(),
                path: artifact.clone(),
                source,
            })?;

        ledger.commit(&id).await?;

        info!(
            key = %key,
            bytes,
            destination = %self.destination.name(),
            "Chunk completed and uploaded"
        );
        Ok(ChunkReport {
            chunk: id,
            key,
            bytes,
        })
    }

    async fn transfer(
        &self,
        chunk: &ChunkDescriptor,
        id: &ChunkId,
        artifact: &Path,
        key: &str,
    ) -> Result<u64, ChunkError> {
        let dataset = run_with_retry(&self.retry, "open", || self.source.open(chunk))
            .await
            .map_err(|source| ChunkError::Fetch {
                chunk: id.clone(),
                source,
            })?;

        let staged = run_with_retry(&self.retry, "materialize", || dataset.materialize(artifact))
            .await
            .map_err(|source| ChunkError::Transform {
                chunk: id.clone(),
                source,
            })?;
        info!(bytes = staged, dataset = %dataset.describe(), "Staged chunk");

        run_with_retry(&self.retry, "upload", || {
            self.destination.put_file(key, artifact)
        })
        .await
        .map_err(|source| ChunkError::Upload {
            chunk: id.clone(),
            source,
        })
    }
}
