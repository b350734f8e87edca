//! Wave power report for a staged grid.

use std::path::Path;

use serde::Serialize;
use tracing::info;
use wave_power::{
    add_power_flux, processing_summary, rank_sites, seasonal_ratio, time_mean, PhysicalConstants,
    ProcessingSummary, RankedSite, POWER_FLUX_VARIABLE,
};

use crate::error::ReportError;
use crate::staging::read_grid;

#[derive(Debug, Clone, Serialize)]
pub struct PowerReport {
    pub summary: ProcessingSummary,
    /// Winter over summer mean power, when both seasons are present.
    pub seasonal_ratio: Option<f64>,
    pub top_sites: Vec<RankedSite>,
}

/// Derive wave power from a staged grid and summarize it.
pub fn summarize_staged_grid(
    path: &Path,
    region: &str,
    top_n: usize,
) -> Result<PowerReport, ReportError> {
    let mut grid = read_grid(path)?;
    add_power_flux(&mut grid, &PhysicalConstants::default())?;

    let summary = processing_summary(&grid, region)?;
    let mean = time_mean(&grid, POWER_FLUX_VARIABLE)?;
    let top_sites = rank_sites(&mean, &grid.latitudes, &grid.longitudes, top_n)?;
    let ratio = seasonal_ratio(&grid, POWER_FLUX_VARIABLE)?;

    info!(
        path = %path.display(),
        timesteps = summary.data_coverage.total_timesteps,
        mean_power = summary.wave_power_statistics.mean_power_w_per_m,
        "Summarized staged grid"
    );

    Ok(PowerReport {
        summary,
        seasonal_ratio: ratio,
        top_sites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::write_grid;
    use test_utils::{create_small_wave_grid, fixtures::scratch_dir};

    #[test]
    fn test_summarize_staged_grid() {
        let dir = scratch_dir();
        let path = dir.path().join("grid.ndjson.gz");
        write_grid(&path, &create_small_wave_grid(), 2).unwrap();

        let report = summarize_staged_grid(&path, "East China Sea", 3).unwrap();
        assert_eq!(report.summary.region, "East China Sea");
        assert_eq!(report.summary.data_coverage.total_timesteps, 4);
        assert_eq!(report.top_sites.len(), 3);
        assert!(
            report.top_sites[0].wave_power_flux_w_per_m
                >= report.top_sites[1].wave_power_flux_w_per_m
        );
        // January only, so no summer months.
        assert_eq!(report.seasonal_ratio, None);
    }

    #[test]
    fn test_grid_without_wave_variables() {
        let dir = scratch_dir();
        let path = dir.path().join("grid.ndjson.gz");
        let grid = test_utils::create_constant_grid(
            "temperature",
            test_utils::create_times(chrono::Utc::now(), 1, 1),
            vec![0.0],
            vec![0.0],
            1.0,
        );
        write_grid(&path, &grid, 50).unwrap();

        assert!(matches!(
            summarize_staged_grid(&path, "Nowhere", 1),
            Err(ReportError::WavePower(_))
        ));
    }
}
