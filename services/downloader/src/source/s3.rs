//! Public S3 bucket source: one chunk per object under a prefix.
//!
//! Objects are mirrored byte for byte, unless the source has a subset box:
//! then each object is decoded as GRIB2, clipped to the box and staged as a
//! grid.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use ocean_common::BoundingBox;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::grib::decode_grib;
use super::{DatasetSource, LazyDataset};
use crate::chunk::ChunkDescriptor;
use crate::error::{SourceError, StagingError};
use crate::planner::KeyLister;
use crate::staging::{write_grid, GRID_EXTENSION};

const LIST_PAGE_SIZE: i32 = 1000;
const DEFAULT_EXTENSION: &str = "bin";

pub struct S3PrefixSource {
    client: Client,
    bucket: String,
    name: String,
    subset: Option<Subset>,
}

#[derive(Debug, Clone, Copy)]
struct Subset {
    bbox: BoundingBox,
    time_chunk: usize,
}

impl S3PrefixSource {
    /// Client with unsigned requests, for public buckets.
    pub async fn anonymous(bucket: &str, region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .no_credentials()
            .load()
            .await;
        Self::with_client(Client::new(&config), bucket)
    }

    pub fn with_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            name: format!("s3://{}", bucket),
            subset: None,
        }
    }

    /// Decode objects as GRIB2 and stage only the points inside `bbox`.
    pub fn with_subset(mut self, bbox: BoundingBox, time_chunk: usize) -> Self {
        self.subset = Some(Subset { bbox, time_chunk });
        self
    }
}

fn s3_error<E>(e: E) -> SourceError
where
    E: std::error::Error,
{
    SourceError::S3(DisplayErrorContext(e).to_string())
}

#[async_trait]
impl KeyLister for S3PrefixSource {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .max_keys(LIST_PAGE_SIZE);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token.clone());
            }

            let response = request.send().await.map_err(s3_error)?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
            debug!(listed = keys.len(), "Listed S3 page");

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        info!(prefix, count = keys.len(), "Listed source objects");
        Ok(keys)
    }
}

#[async_trait]
impl DatasetSource for S3PrefixSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_extension(&self, chunk: &ChunkDescriptor) -> String {
        if self.subset.is_some() {
            return GRID_EXTENSION.to_string();
        }
        chunk
            .source_extension()
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string()
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn LazyDataset>, SourceError> {
        let key = match chunk {
            ChunkDescriptor::Object { key } => key.clone(),
            other => return Err(SourceError::UnsupportedChunk(other.to_string())),
        };

        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(s3_error)?;
        let size = head.content_length().and_then(|n| u64::try_from(n).ok());
        debug!(key = %key, size = ?size, "Opened S3 object");

        Ok(Box::new(S3Object {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key,
            size,
            subset: self.subset,
        }))
    }
}

struct S3Object {
    client: Client,
    bucket: String,
    key: String,
    size: Option<u64>,
    subset: Option<Subset>,
}

impl S3Object {
    async fn download(&self, dest: &Path) -> Result<u64, SourceError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(s3_error)?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body;
        let mut written = 0u64;

        while let Some(chunk) = body.try_next().await.map_err(s3_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = self.size {
            if written != expected {
                return Err(SourceError::Decode(format!(
                    "size mismatch for {}: expected {} bytes, got {}",
                    self.key, expected, written
                )));
            }
        }

        Ok(written)
    }

    async fn download_subset(
        &self,
        raw: &Path,
        dest: &Path,
        subset: Subset,
    ) -> Result<u64, SourceError> {
        self.download(raw).await?;
        let bytes = tokio::fs::read(raw).await?;
        let dest = dest.to_path_buf();

        let written = tokio::task::spawn_blocking(move || {
            let grid = decode_grib(&bytes, &subset.bbox)?;
            write_grid(&dest, &grid, subset.time_chunk).map_err(SourceError::from)
        })
        .await
        .map_err(|e| StagingError::Task(e.to_string()))??;

        Ok(written)
    }
}

/// `{dest}.download`, next to the staged artifact.
fn download_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".download");
    PathBuf::from(name)
}

#[async_trait]
impl LazyDataset for S3Object {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    async fn materialize(&self, dest: &Path) -> Result<u64, SourceError> {
        let Some(subset) = self.subset else {
            return self.download(dest).await;
        };

        let raw = download_path(dest);
        let result = self.download_subset(&raw, dest, subset).await;
        if let Err(e) = tokio::fs::remove_file(&raw).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %raw.display(), error = %e, "Failed to remove raw download");
            }
        }
        result
    }
}
