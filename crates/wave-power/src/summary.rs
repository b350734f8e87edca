//! Processing summary for a wave power dataset.

use chrono::Utc;
use ocean_common::WaveGrid;
use serde::Serialize;

use crate::error::{Result, WavePowerError};
use crate::flux::POWER_FLUX_VARIABLE;
use crate::stats::{self, consistency_metrics, ConsistencyMetrics};

/// Percentile used for the consistency threshold.
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 75.0;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub region: String,
    pub processing_date: String,
    pub data_coverage: DataCoverage,
    pub spatial_coverage: Option<SpatialCoverage>,
    pub wave_power_statistics: PowerStatistics,
    pub consistency_metrics: ConsistencyMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataCoverage {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_timesteps: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialCoverage {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub grid_points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerStatistics {
    pub mean_power_w_per_m: f64,
    pub max_power_w_per_m: f64,
    pub min_power_w_per_m: f64,
    pub std_power_w_per_m: f64,
}

/// Summarize a grid that already carries [`POWER_FLUX_VARIABLE`].
pub fn processing_summary(grid: &WaveGrid, region: &str) -> Result<ProcessingSummary> {
    if !grid.has_variable(POWER_FLUX_VARIABLE) {
        return Err(WavePowerError::MissingPowerFlux(
            POWER_FLUX_VARIABLE.to_string(),
        ));
    }
    let power = grid.variable(POWER_FLUX_VARIABLE)?;
    let clean = stats::finite_values(power);

    let date = |t: Option<&chrono::DateTime<Utc>>| t.map(|t| t.format("%Y-%m-%d").to_string());

    Ok(ProcessingSummary {
        region: region.to_string(),
        processing_date: Utc::now().to_rfc3339(),
        data_coverage: DataCoverage {
            start_date: date(grid.times.iter().min()),
            end_date: date(grid.times.iter().max()),
            total_timesteps: grid.times.len(),
        },
        spatial_coverage: grid.bbox().map(|bbox| SpatialCoverage {
            lat_min: bbox.min_lat,
            lat_max: bbox.max_lat,
            lon_min: bbox.min_lon,
            lon_max: bbox.max_lon,
            grid_points: grid.grid_points(),
        }),
        wave_power_statistics: PowerStatistics {
            mean_power_w_per_m: stats::mean(&clean),
            max_power_w_per_m: stats::max(&clean),
            min_power_w_per_m: stats::min(&clean),
            std_power_w_per_m: stats::std_dev(&clean),
        },
        consistency_metrics: consistency_metrics(power, DEFAULT_THRESHOLD_PERCENTILE),
    })
}
