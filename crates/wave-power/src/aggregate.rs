//! Aggregations over the time axis of a grid.

use std::collections::BTreeMap;

use chrono::Datelike;
use ocean_common::WaveGrid;
use serde::Serialize;

use crate::error::Result;
use crate::stats;

/// Northern-hemisphere winter months.
pub const WINTER_MONTHS: [u32; 3] = [12, 1, 2];
/// Northern-hemisphere summer months.
pub const SUMMER_MONTHS: [u32; 3] = [6, 7, 8];

/// Per-cell statistics for one calendar month, pooled across years.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStats {
    pub month: u32,
    pub time_steps: usize,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub max: Vec<f32>,
    pub min: Vec<f32>,
}

/// Group time steps by calendar month and reduce each cell.
pub fn monthly_aggregations(grid: &WaveGrid, variable: &str) -> Result<Vec<MonthlyStats>> {
    let values = grid.variable(variable)?;
    let n = grid.grid_points();

    let mut by_month: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (t, time) in grid.times.iter().enumerate() {
        by_month.entry(time.month()).or_default().push(t);
    }

    let mut result = Vec::with_capacity(by_month.len());
    for (month, steps) in by_month {
        let mut out = MonthlyStats {
            month,
            time_steps: steps.len(),
            mean: Vec::with_capacity(n),
            std: Vec::with_capacity(n),
            max: Vec::with_capacity(n),
            min: Vec::with_capacity(n),
        };

        for cell in 0..n {
            let series: Vec<f32> = steps.iter().map(|&t| values[t * n + cell]).collect();
            let clean = stats::finite_values(&series);
            out.mean.push(stats::mean(&clean) as f32);
            out.std.push(stats::std_dev(&clean) as f32);
            out.max.push(stats::max(&clean) as f32);
            out.min.push(stats::min(&clean) as f32);
        }

        result.push(out);
    }

    Ok(result)
}

/// Per-cell mean over all time steps.
pub fn time_mean(grid: &WaveGrid, variable: &str) -> Result<Vec<f32>> {
    let values = grid.variable(variable)?;
    let n = grid.grid_points();
    let steps = grid.times.len();

    Ok((0..n)
        .map(|cell| {
            let series: Vec<f32> = (0..steps).map(|t| values[t * n + cell]).collect();
            stats::mean(&stats::finite_values(&series)) as f32
        })
        .collect())
}

/// Ratio of winter to summer mean over the whole grid.
///
/// `None` when either season has no data or the summer mean is not positive.
pub fn seasonal_ratio(grid: &WaveGrid, variable: &str) -> Result<Option<f64>> {
    let winter = season_mean(grid, variable, &WINTER_MONTHS)?;
    let summer = season_mean(grid, variable, &SUMMER_MONTHS)?;

    if winter.is_nan() || summer.is_nan() || summer <= 0.0 {
        return Ok(None);
    }
    Ok(Some(winter / summer))
}

fn season_mean(grid: &WaveGrid, variable: &str, months: &[u32]) -> Result<f64> {
    let values = grid.variable(variable)?;
    let n = grid.grid_points();

    let mut selected = Vec::new();
    for (t, time) in grid.times.iter().enumerate() {
        if months.contains(&time.month()) {
            selected.extend_from_slice(&values[t * n..(t + 1) * n]);
        }
    }

    Ok(stats::mean(&stats::finite_values(&selected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn two_month_grid() -> WaveGrid {
        let times = vec![
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap(),
        ];
        let mut grid = WaveGrid::new(times, vec![10.0], vec![20.0, 21.0]);
        grid.insert_variable("p", vec![2.0, f32::NAN, 4.0, 6.0, 1.0, 3.0])
            .unwrap();
        grid
    }

    #[test]
    fn test_monthly_groups() {
        let monthly = monthly_aggregations(&two_month_grid(), "p").unwrap();
        assert_eq!(monthly.len(), 2);

        let jan = &monthly[0];
        assert_eq!(jan.month, 1);
        assert_eq!(jan.time_steps, 2);
        assert_eq!(jan.mean, vec![3.0, 6.0]);
        assert_eq!(jan.std, vec![1.0, 0.0]);
        assert_eq!(jan.max, vec![4.0, 6.0]);
        assert_eq!(jan.min, vec![2.0, 6.0]);

        assert_eq!(monthly[1].month, 7);
        assert_eq!(monthly[1].mean, vec![1.0, 3.0]);
    }

    #[test]
    fn test_time_mean_skips_nan() {
        let mean = time_mean(&two_month_grid(), "p").unwrap();
        assert_eq!(mean, vec![7.0 / 3.0, 4.5]);
    }

    #[test]
    fn test_seasonal_ratio() {
        // winter: 2, 4, 6 -> 4; summer: 1, 3 -> 2
        let ratio = seasonal_ratio(&two_month_grid(), "p").unwrap();
        assert_eq!(ratio, Some(2.0));
    }

    #[test]
    fn test_seasonal_ratio_without_summer() {
        let mut grid = two_month_grid();
        grid.times[2] = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(seasonal_ratio(&grid, "p").unwrap(), None);
    }
}
