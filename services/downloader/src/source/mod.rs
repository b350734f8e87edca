//! Remote dataset providers.

mod erddap;
mod grib;
mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::chunk::ChunkDescriptor;
use crate::error::SourceError;

pub use erddap::{table_to_grid, ErddapConfig, ErddapSource, ErddapTable};
pub use grib::decode_grib;
pub use s3::S3PrefixSource;

/// A provider that can open a lazy handle for one chunk.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    fn name(&self) -> &str;

    /// Extension of the staged artifact for `chunk`, without the leading dot.
    fn artifact_extension(&self, chunk: &ChunkDescriptor) -> String;

    /// Open a handle scoped to the chunk's bounds without pulling its data.
    async fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn LazyDataset>, SourceError>;
}

/// Data that has been located but not yet downloaded.
#[async_trait]
pub trait LazyDataset: Send + Sync {
    fn describe(&self) -> String;

    /// Download and write the data to `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    async fn materialize(&self, dest: &Path) -> Result<u64, SourceError>;
}
