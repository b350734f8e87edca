//! Error types for the transfer pipeline.

use std::path::PathBuf;

use ocean_common::OceanError;
use thiserror::Error;

use crate::chunk::ChunkId;

/// Failures talking to a remote dataset provider.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("S3 request failed: {0}")]
    S3(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing expected variable: {0}")]
    MissingVariable(String),

    #[error("Chunk not supported by this source: {0}")]
    UnsupportedChunk(String),

    #[error("Staging write failed: {0}")]
    Staging(#[from] StagingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reading or writing staged grid files.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid staged grid: {0}")]
    Format(String),

    #[error("Staging task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Grid(#[from] OceanError),
}

/// Failures reading or persisting the completion ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger {} is not a JSON array of chunk ids: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write ledger {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a single chunk did not complete.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("fetch failed for chunk {chunk}: {source}")]
    Fetch {
        chunk: ChunkId,
        #[source]
        source: SourceError,
    },

    #[error("transform failed for chunk {chunk}: {source}")]
    Transform {
        chunk: ChunkId,
        #[source]
        source: SourceError,
    },

    #[error("upload failed for chunk {chunk}: {source}")]
    Upload {
        chunk: ChunkId,
        #[source]
        source: OceanError,
    },

    #[error("failed to remove staged file {} for chunk {chunk}: {source}", path.display())]
    Cleanup {
        chunk: ChunkId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ChunkError {
    /// Ledger failures stop the whole run; everything else only loses the chunk.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ChunkError::Ledger(_))
    }
}

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("ledger failure, run aborted: {0}")]
    Ledger(#[from] LedgerError),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanError),

    #[error("invalid job configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("source setup failed: {0}")]
    Source(#[from] SourceError),

    #[error("failed to prepare staging directory: {0}")]
    Staging(#[from] std::io::Error),

    #[error("chunk failure, run aborted: {0}")]
    Chunk(#[source] Box<ChunkError>),
}

impl From<ChunkError> for PipelineError {
    fn from(e: ChunkError) -> Self {
        match e {
            ChunkError::Ledger(ledger) => PipelineError::Ledger(ledger),
            other => PipelineError::Chunk(Box::new(other)),
        }
    }
}

/// Errors summarizing a staged grid.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    WavePower(#[from] wave_power::WavePowerError),
}

/// Errors building a chunk plan.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Granularity step must be at least 1, got {0}")]
    InvalidGranularity(String),

    #[error("Failed to list source keys: {0}")]
    Listing(#[from] SourceError),
}

/// Rejected retry settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryPolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("delay_secs must be a non-negative number, got {0}")]
    InvalidDelay(f64),
}

/// Errors loading or validating job configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid job {job}: {reason}")]
    Invalid { job: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ledger_errors_are_run_fatal() {
        let chunk = ChunkId::new("20200101_20200201");
        let upload = ChunkError::Upload {
            chunk: chunk.clone(),
            source: OceanError::StorageError("timeout".into()),
        };
        assert!(!upload.is_run_fatal());

        let fetch = ChunkError::Fetch {
            chunk,
            source: SourceError::Decode("bad json".into()),
        };
        assert!(!fetch.is_run_fatal());

        let ledger = ChunkError::Ledger(LedgerError::Write {
            path: PathBuf::from("state/job.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        });
        assert!(ledger.is_run_fatal());
        assert!(matches!(
            PipelineError::from(ledger),
            PipelineError::Ledger(LedgerError::Write { .. })
        ));
    }

    #[test]
    fn test_chunk_error_display_names_chunk() {
        let err = ChunkError::Transform {
            chunk: ChunkId::new("20200101_20200201"),
            source: SourceError::MissingVariable("VHM0".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("20200101_20200201"));
        assert!(msg.contains("VHM0"));
    }
}
