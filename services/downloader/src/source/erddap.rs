//! ERDDAP griddap source.
//!
//! Requests a time window of selected variables as a JSON table and stages
//! it as a [`WaveGrid`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ocean_common::time::parse_datetime;
use ocean_common::{BoundingBox, TimeRange, WaveGrid};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{DatasetSource, LazyDataset};
use crate::chunk::ChunkDescriptor;
use crate::error::{SourceError, StagingError};
use crate::staging::{write_grid, GRID_EXTENSION};

const TIME_COLUMN: &str = "time";
const LATITUDE_COLUMN: &str = "latitude";
const LONGITUDE_COLUMN: &str = "longitude";

/// Connection settings for one griddap dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct ErddapConfig {
    /// Server root, e.g. `https://coastwatch.pfeg.noaa.gov/erddap`
    pub base_url: String,
    pub dataset_id: String,
    pub variables: Vec<String>,
    /// Index stride applied to every axis.
    #[serde(default = "default_stride")]
    pub stride: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_stride() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    600
}

pub struct ErddapSource {
    client: Client,
    config: ErddapConfig,
    time_chunk: usize,
    name: String,
}

impl ErddapSource {
    pub fn new(config: ErddapConfig, time_chunk: usize) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("ocean-downloader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let name = format!("erddap:{}", config.dataset_id);

        Ok(Self {
            client,
            config,
            time_chunk,
            name,
        })
    }

    fn dataset_url(&self, suffix: &str) -> String {
        format!(
            "{}/griddap/{}.{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.dataset_id,
            suffix
        )
    }

    /// Dataset attribute listing, used to check availability.
    pub fn metadata_url(&self) -> String {
        self.dataset_url("das")
    }

    /// JSON table request for the window and optional bbox.
    ///
    /// The time constraint is inclusive at both ends on the server side;
    /// the end step is dropped after download.
    pub fn data_url(&self, range: &TimeRange, bbox: Option<&BoundingBox>) -> String {
        let stride = self.config.stride.max(1);
        let axis = |lo: String, hi: String| format!("[{}:{}:{}]", lo, stride, hi);

        let time = axis(
            format!("({})", erddap_time(range.start)),
            format!("({})", erddap_time(range.end)),
        );
        let space = match bbox {
            Some(b) => format!(
                "{}{}",
                axis(format!("({})", b.min_lat), format!("({})", b.max_lat)),
                axis(format!("({})", b.min_lon), format!("({})", b.max_lon)),
            ),
            None => format!(
                "{}{}",
                axis("0".to_string(), "last".to_string()),
                axis("0".to_string(), "last".to_string())
            ),
        };

        let query = self
            .config
            .variables
            .iter()
            .map(|v| format!("{}{}{}", v, time, space))
            .collect::<Vec<_>>()
            .join(",");

        format!("{}?{}", self.dataset_url("json"), query)
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

fn erddap_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl DatasetSource for ErddapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_extension(&self, _chunk: &ChunkDescriptor) -> String {
        GRID_EXTENSION.to_string()
    }

    #[instrument(skip(self), fields(dataset = %self.config.dataset_id))]
    async fn open(&self, chunk: &ChunkDescriptor) -> Result<Box<dyn LazyDataset>, SourceError> {
        let (range, bbox) = match chunk {
            ChunkDescriptor::Window { range, bbox } => (*range, *bbox),
            other => return Err(SourceError::UnsupportedChunk(other.to_string())),
        };

        self.get_checked(&self.metadata_url()).await?;
        let url = self.data_url(&range, bbox.as_ref());
        debug!(url = %url, "Opened ERDDAP window");

        Ok(Box::new(ErddapWindow {
            client: self.client.clone(),
            url,
            range,
            bbox,
            variables: self.config.variables.clone(),
            time_chunk: self.time_chunk,
        }))
    }
}

struct ErddapWindow {
    client: Client,
    url: String,
    range: TimeRange,
    bbox: Option<BoundingBox>,
    variables: Vec<String>,
    time_chunk: usize,
}

#[derive(Debug, Deserialize)]
struct ErddapResponse {
    table: ErddapTable,
}

/// The `table` object of an ERDDAP `.json` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErddapTable {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[async_trait]
impl LazyDataset for ErddapWindow {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn materialize(&self, dest: &Path) -> Result<u64, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body: ErddapResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let mut grid = table_to_grid(&body.table, &self.variables)?.select_time(&self.range);
        if let Some(bbox) = &self.bbox {
            grid = grid.subset(bbox);
        }
        let (steps, lats, lons) = grid.shape();
        info!(steps, lats, lons, "Downloaded ERDDAP window");

        let dest = dest.to_path_buf();
        let time_chunk = self.time_chunk;
        let bytes = tokio::task::spawn_blocking(move || write_grid(&dest, &grid, time_chunk))
            .await
            .map_err(|e| StagingError::Task(e.to_string()))??;

        Ok(bytes)
    }
}

/// Pivot a griddap table into a grid with sorted axes.
///
/// Cells absent from the table and `null` values become NaN.
pub fn table_to_grid(table: &ErddapTable, variables: &[String]) -> Result<WaveGrid, SourceError> {
    let column = |name: &str| {
        table
            .column_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SourceError::MissingVariable(name.to_string()))
    };
    let time_col = column(TIME_COLUMN)?;
    let lat_col = column(LATITUDE_COLUMN)?;
    let lon_col = column(LONGITUDE_COLUMN)?;
    let var_cols = variables
        .iter()
        .map(|v| column(v.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut parsed = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let cell = |col: usize| {
            row.get(col)
                .ok_or_else(|| SourceError::Decode(format!("row {} has {} cells", i, row.len())))
        };
        let time = cell(time_col)?
            .as_str()
            .ok_or_else(|| SourceError::Decode(format!("row {}: time is not a string", i)))
            .and_then(|s| parse_datetime(s).map_err(|e| SourceError::Decode(e.to_string())))?;
        let lat = number(cell(lat_col)?)
            .ok_or_else(|| SourceError::Decode(format!("row {}: latitude is not a number", i)))?;
        let lon = number(cell(lon_col)?)
            .ok_or_else(|| SourceError::Decode(format!("row {}: longitude is not a number", i)))?;
        let values = var_cols
            .iter()
            .map(|&c| cell(c).map(|v| number(v).map_or(f32::NAN, |x| x as f32)))
            .collect::<Result<Vec<_>, _>>()?;
        parsed.push((time, lat, lon, values));
    }

    let mut times: Vec<DateTime<Utc>> = parsed.iter().map(|r| r.0).collect();
    times.sort();
    times.dedup();
    let latitudes = sorted_axis(parsed.iter().map(|r| r.1));
    let longitudes = sorted_axis(parsed.iter().map(|r| r.2));

    let mut grid = WaveGrid::new(times, latitudes, longitudes);
    let mut data = vec![vec![f32::NAN; grid.len()]; variables.len()];
    for (time, lat, lon, values) in parsed {
        let t = grid.times.binary_search(&time).unwrap_or_default();
        let y = grid
            .latitudes
            .binary_search_by(|p| p.total_cmp(&lat))
            .unwrap_or_default();
        let x = grid
            .longitudes
            .binary_search_by(|p| p.total_cmp(&lon))
            .unwrap_or_default();
        let idx = grid.index(t, y, x);
        for (series, value) in data.iter_mut().zip(values) {
            series[idx] = value;
        }
    }

    for (name, values) in variables.iter().zip(data) {
        grid.insert_variable(name.clone(), values)
            .map_err(|e| SourceError::Decode(e.to_string()))?;
    }
    Ok(grid)
}

fn number(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn sorted_axis(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut axis: Vec<f64> = values.collect();
    axis.sort_by(|a, b| a.total_cmp(b));
    axis.dedup_by(|a, b| a.total_cmp(b).is_eq());
    axis
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn source() -> ErddapSource {
        let config = ErddapConfig {
            base_url: "https://erddap.example.org/erddap/".to_string(),
            dataset_id: "cmems_wav".to_string(),
            variables: vec!["VHM0".to_string(), "VTPK".to_string()],
            stride: 1,
            timeout_secs: 10,
        };
        ErddapSource::new(config, 50).unwrap()
    }

    fn table(rows: Value) -> ErddapTable {
        serde_json::from_value(json!({
            "columnNames": ["time", "latitude", "longitude", "VHM0", "VTPK"],
            "columnTypes": ["String", "float", "float", "float", "float"],
            "rows": rows,
        }))
        .unwrap()
    }

    #[test]
    fn test_data_url() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
        );
        let bbox = BoundingBox::new(129.0, 20.0, 150.0, 45.0);
        let url = source().data_url(&range, Some(&bbox));

        assert_eq!(
            url,
            "https://erddap.example.org/erddap/griddap/cmems_wav.json?\
             VHM0[(2020-01-01T00:00:00Z):1:(2020-02-01T00:00:00Z)][(20):1:(45)][(129):1:(150)],\
             VTPK[(2020-01-01T00:00:00Z):1:(2020-02-01T00:00:00Z)][(20):1:(45)][(129):1:(150)]"
        );
        assert_eq!(
            source().metadata_url(),
            "https://erddap.example.org/erddap/griddap/cmems_wav.das"
        );
    }

    #[test]
    fn test_data_url_without_bbox() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        );
        let url = source().data_url(&range, None);
        assert!(url.contains("[0:1:last][0:1:last]"));
    }

    #[test]
    fn test_table_to_grid() {
        let t = table(json!([
            ["2020-01-01T03:00:00Z", 20.0, 131.0, 2.0, 9.0],
            ["2020-01-01T00:00:00Z", 20.0, 130.0, 1.0, 8.0],
            ["2020-01-01T00:00:00Z", 20.0, 131.0, null, 8.5],
            ["2020-01-01T03:00:00Z", 20.0, 130.0, 1.5, 8.0],
        ]));
        let grid = table_to_grid(&t, &["VHM0".to_string(), "VTPK".to_string()]).unwrap();

        assert_eq!(grid.shape(), (2, 1, 2));
        assert_eq!(grid.times[0], Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(grid.longitudes, vec![130.0, 131.0]);
        assert_eq!(grid.value("VHM0", 0, 0, 0), Some(1.0));
        assert!(grid.value("VHM0", 0, 0, 1).unwrap().is_nan());
        assert_eq!(grid.value("VHM0", 1, 0, 1), Some(2.0));
        assert_eq!(grid.value("VTPK", 0, 0, 1), Some(8.5));
    }

    #[test]
    fn test_missing_variable_column() {
        let t = table(json!([["2020-01-01T00:00:00Z", 20.0, 130.0, 1.0, 8.0]]));
        let result = table_to_grid(&t, &["swh".to_string()]);
        assert!(matches!(result, Err(SourceError::MissingVariable(v)) if v == "swh"));
    }

    #[test]
    fn test_malformed_row() {
        let t = table(json!([["not-a-time", 20.0, 130.0, 1.0, 8.0]]));
        let result = table_to_grid(&t, &["VHM0".to_string()]);
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_object_chunks_unsupported() {
        let result = source().open(&ChunkDescriptor::object("a/b.grib2")).await;
        assert!(matches!(result, Err(SourceError::UnsupportedChunk(_))));
    }
}
