//! Object storage interface for uploaded chunks (S3/MinIO compatible).

use std::env;
use std::path::Path as LocalPath;
use std::sync::Arc;

use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use ocean_common::{OceanError, OceanResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Custom S3 endpoint (MinIO etc.); AWS when unset
    pub endpoint: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Access key ID; falls back to the AWS environment chain when unset
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// AWS region
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "panthalassa-ocean-raw-data".to_string(),
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-2".to_string(),
            allow_http: false,
        }
    }
}

impl ObjectStorageConfig {
    /// Read connection settings from `S3_*` environment variables.
    pub fn from_env(bucket: &str) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            bucket: bucket.to_string(),
            access_key_id: env::var("S3_ACCESS_KEY").ok(),
            secret_access_key: env::var("S3_SECRET_KEY").ok(),
            region: env::var("S3_REGION").unwrap_or(defaults.region),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

/// Object storage client for ocean data.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> OceanResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| OceanError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::from_store(Arc::new(store), &config.bucket))
    }

    /// Wrap an existing store.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
        }
    }

    /// An in-process store, used by tests and dry runs.
    pub fn in_memory(bucket: &str) -> Self {
        Self::from_store(Arc::new(InMemory::new()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Stream a local file to a path in the bucket as a multipart upload.
    /// Returns bytes written. A failed upload is aborted.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn put_file(&self, path: &str, local: &LocalPath) -> OceanResult<u64> {
        let location = Path::from(path);
        let mut file = tokio::fs::File::open(local).await?;

        let (multipart_id, mut writer) = self
            .store
            .put_multipart(&location)
            .await
            .map_err(|e| OceanError::StorageError(format!("Failed to start {}: {}", path, e)))?;

        let upload = async {
            let size = tokio::io::copy(&mut file, &mut writer).await?;
            writer.shutdown().await?;
            Ok::<u64, std::io::Error>(size)
        }
        .await;

        match upload {
            Ok(size) => {
                debug!(size, "Uploaded object");
                Ok(size)
            }
            Err(e) => {
                if let Err(abort) = self.store.abort_multipart(&location, &multipart_id).await {
                    warn!(error = %abort, "Failed to abort multipart upload");
                }
                Err(OceanError::StorageError(format!(
                    "Failed to write {}: {}",
                    path, e
                )))
            }
        }
    }

    /// List object keys under a prefix.
    pub async fn list(&self, prefix: &str) -> OceanResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| OceanError::StorageError(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        paths.sort();
        Ok(paths)
    }
}

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    /// Build path for a time-window chunk.
    /// Format: {prefix}{year}/{chunk_id}.{ext}
    pub fn window_chunk(prefix: &str, year: i32, chunk_id: &str, ext: &str) -> String {
        format!("{}{}/{}.{}", Self::normalize_prefix(prefix), year, chunk_id, ext)
    }

    /// Build path for a chunk mirrored from a source object.
    /// Format: {prefix}{folder}/{stem}.{ext}
    pub fn object_chunk(prefix: &str, folder: &str, stem: &str, ext: &str) -> String {
        let prefix = Self::normalize_prefix(prefix);
        if folder.is_empty() {
            format!("{}{}.{}", prefix, stem, ext)
        } else {
            format!("{}{}/{}.{}", prefix, folder, stem, ext)
        }
    }

    /// Ensure a non-empty prefix ends with exactly one slash.
    pub fn normalize_prefix(prefix: &str) -> String {
        let trimmed = prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        assert_eq!(
            StoragePath::window_chunk("", 2020, "20200101_20200201", "ndjson.gz"),
            "2020/20200101_20200201.ndjson.gz"
        );

        assert_eq!(
            StoragePath::object_chunk("noaa-data/2019/", "20190101", "gefs.wave.t00z", "grib2"),
            "noaa-data/2019/20190101/gefs.wave.t00z.grib2"
        );

        assert_eq!(StoragePath::normalize_prefix("/raw//"), "raw/");
    }

    async fn read_back(storage: &ObjectStorage, path: &str) -> Vec<u8> {
        let result = storage.store.get(&Path::from(path)).await.unwrap();
        result.bytes().await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_put_file_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("chunk.bin");
        let second = dir.path().join("other.bin");
        std::fs::write(&first, vec![7u8; 128]).unwrap();
        std::fs::write(&second, b"x").unwrap();

        let storage = ObjectStorage::in_memory("test-bucket");
        assert_eq!(storage.put_file("2020/chunk.bin", &first).await.unwrap(), 128);
        assert_eq!(storage.put_file("2021/other.bin", &second).await.unwrap(), 1);

        assert_eq!(storage.list("2020").await.unwrap(), vec!["2020/chunk.bin"]);
        assert_eq!(read_back(&storage, "2020/chunk.bin").await, vec![7u8; 128]);
    }

    #[tokio::test]
    async fn test_put_file_streams_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("month.ndjson.gz");
        let data: Vec<u8> = (0..12 * 1024 * 1024 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&local, &data).unwrap();

        let storage = ObjectStorage::in_memory("test-bucket");
        let written = storage.put_file("2020/month.ndjson.gz", &local).await.unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(read_back(&storage, "2020/month.ndjson.gz").await, data);
    }

    #[tokio::test]
    async fn test_put_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ObjectStorage::in_memory("test-bucket");

        let result = storage.put_file("2020/gone.bin", &dir.path().join("gone.bin")).await;
        assert!(matches!(result, Err(OceanError::Io(_))));
        assert!(storage.list("2020").await.unwrap().is_empty());
    }
}
