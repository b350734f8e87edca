//! Chunk descriptors and their stable identifiers.

use std::fmt;

use chrono::{Datelike, Duration};
use ocean_common::{BoundingBox, TimeRange};
use serde::{Deserialize, Serialize};
use storage::StoragePath;

/// Stable identifier of a chunk, used as ledger entry and key fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One independent unit of transfer work.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkDescriptor {
    /// Half-open time window of a gridded dataset.
    Window {
        range: TimeRange,
        bbox: Option<BoundingBox>,
    },
    /// A single object under a remote key prefix.
    Object { key: String },
}

impl ChunkDescriptor {
    pub fn window(range: TimeRange, bbox: Option<BoundingBox>) -> Self {
        Self::Window { range, bbox }
    }

    pub fn object(key: impl Into<String>) -> Self {
        Self::Object { key: key.into() }
    }

    /// Derive the chunk id from the descriptor's fields alone.
    pub fn id(&self) -> ChunkId {
        match self {
            Self::Window { range, .. } => {
                let fmt = if range.duration() < Duration::days(1) {
                    "%Y%m%dT%H"
                } else {
                    "%Y%m%d"
                };
                ChunkId(format!(
                    "{}_{}",
                    range.start.format(fmt),
                    range.end.format(fmt)
                ))
            }
            Self::Object { key } => ChunkId(file_name(key).to_string()),
        }
    }

    /// Object key the staged artifact is uploaded to.
    pub fn destination_key(&self, prefix: &str, ext: &str) -> String {
        match self {
            Self::Window { range, .. } => StoragePath::window_chunk(
                prefix,
                range.start.year(),
                self.id().as_str(),
                ext,
            ),
            Self::Object { key } => {
                let folder = key.rsplit('/').nth(1).unwrap_or("");
                StoragePath::object_chunk(prefix, folder, file_stem(file_name(key)), ext)
            }
        }
    }

    /// Extension of the source object, if any.
    pub fn source_extension(&self) -> Option<&str> {
        match self {
            Self::Window { .. } => None,
            Self::Object { key } => file_name(key).rsplit_once('.').map(|(_, ext)| ext),
        }
    }
}

impl fmt::Display for ChunkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window { range, bbox: Some(bbox) } => write!(f, "{} in {}", range, bbox),
            Self::Window { range, bbox: None } => write!(f, "{}", range),
            Self::Object { key } => write!(f, "{}", key),
        }
    }
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
