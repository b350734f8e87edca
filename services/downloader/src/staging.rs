//! Local staging of chunk artifacts between fetch and upload.
//!
//! Gridded chunks are staged as gzip-compressed NDJSON: a header line with
//! the coordinate axes, then one line per variable per block of at most
//! `time_chunk` time steps. Missing values are written as `null`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ocean_common::WaveGrid;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::ChunkId;
use crate::error::StagingError;

/// File extension of staged grids.
pub const GRID_EXTENSION: &str = "ndjson.gz";

/// Default number of time steps per written block.
pub const DEFAULT_TIME_CHUNK: usize = 50;

const FORMAT_NAME: &str = "wavegrid-ndjson";
const FORMAT_VERSION: u32 = 1;

/// Directory holding at most one in-flight artifact per chunk.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub async fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{chunk_id}.{ext}`
    pub fn artifact_path(&self, id: &ChunkId, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, ext))
    }

    /// Remove an artifact. Returns false if it was already gone.
    pub async fn discard(&self, path: &Path) -> std::io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed staged artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove staged artifact");
                Err(e)
            }
        }
    }

    /// Files currently in the staging directory.
    pub fn artifacts(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GridHeader {
    format: String,
    version: u32,
    times: Vec<DateTime<Utc>>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    variables: Vec<String>,
    time_chunk: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct GridBlock {
    variable: String,
    time_start: usize,
    time_count: usize,
    values: Vec<Option<f32>>,
}

/// Write `grid` to `path`, replacing any existing file. Returns bytes written.
pub fn write_grid(path: &Path, grid: &WaveGrid, time_chunk: usize) -> Result<u64, StagingError> {
    let time_chunk = time_chunk.max(1);
    let header = GridHeader {
        format: FORMAT_NAME.to_string(),
        version: FORMAT_VERSION,
        times: grid.times.clone(),
        latitudes: grid.latitudes.clone(),
        longitudes: grid.longitudes.clone(),
        variables: grid.variable_names().map(String::from).collect(),
        time_chunk,
    };

    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, &header)?;
    encoder.write_all(b"\n")?;

    let n = grid.grid_points();
    let steps = grid.times.len();
    for name in &header.variables {
        let values = grid.variable(name)?;
        let mut start = 0;
        while start < steps {
            let count = time_chunk.min(steps - start);
            let block = GridBlock {
                variable: name.clone(),
                time_start: start,
                time_count: count,
                values: values[start * n..(start + count) * n]
                    .iter()
                    .map(|v| v.is_finite().then_some(*v))
                    .collect(),
            };
            serde_json::to_writer(&mut encoder, &block)?;
            encoder.write_all(b"\n")?;
            start += count;
        }
    }

    let mut writer = encoder.finish()?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| StagingError::Io(e.into_error()))?;
    file.sync_all()?;

    Ok(file.metadata()?.len())
}

/// Read a grid written by [`write_grid`].
pub fn read_grid(path: &Path) -> Result<WaveGrid, StagingError> {
    let reader = BufReader::new(GzDecoder::new(File::open(path)?));
    let mut lines = reader.lines();

    let header_line = lines
        .next()
        .ok_or_else(|| StagingError::Format("empty file".to_string()))??;
    let header: GridHeader = serde_json::from_str(&header_line)?;
    if header.format != FORMAT_NAME || header.version != FORMAT_VERSION {
        return Err(StagingError::Format(format!(
            "unsupported format {} v{}",
            header.format, header.version
        )));
    }

    let mut grid = WaveGrid::new(header.times, header.latitudes, header.longitudes);
    let n = grid.grid_points();
    let steps = grid.times.len();
    let mut variables: Vec<(String, Vec<f32>, usize)> = header
        .variables
        .into_iter()
        .map(|name| (name, vec![f32::NAN; steps * n], 0))
        .collect();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let block: GridBlock = serde_json::from_str(&line)?;
        let (_, values, filled) = variables
            .iter_mut()
            .find(|(name, _, _)| *name == block.variable)
            .ok_or_else(|| {
                StagingError::Format(format!("block for undeclared variable {}", block.variable))
            })?;

        let start = block.time_start * n;
        let end = (block.time_start + block.time_count) * n;
        if end > values.len() || block.values.len() != end - start {
            return Err(StagingError::Format(format!(
                "block {}[{}..{}] does not fit the grid",
                block.variable,
                block.time_start,
                block.time_start + block.time_count
            )));
        }
        for (slot, v) in values[start..end].iter_mut().zip(block.values) {
            *slot = v.unwrap_or(f32::NAN);
        }
        *filled += block.time_count;
    }

    for (name, values, filled) in variables {
        if filled != steps {
            return Err(StagingError::Format(format!(
                "variable {} has {} of {} time steps",
                name, filled, steps
            )));
        }
        grid.insert_variable(name, values)?;
    }

    Ok(grid)
}
