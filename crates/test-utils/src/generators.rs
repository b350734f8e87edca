//! Test data generators for creating synthetic wave datasets.
//!
//! These generators create predictable, verifiable patterns that can be
//! checked cell by cell after subsetting, staging, or upload.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ocean_common::WaveGrid;

/// Creates a flat grid with predictable values.
///
/// Each cell value is calculated as: `t * 10000 + col * 100 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_indexed_values;
///
/// let values = create_indexed_values(2, 3, 4);
/// assert_eq!(values.len(), 24);
/// assert_eq!(values[1], 100.0);   // t=0, row=0, col=1
/// assert_eq!(values[4], 1.0);     // t=0, row=1, col=0
/// assert_eq!(values[12], 10000.0); // t=1, row=0, col=0
/// ```
pub fn create_indexed_values(steps: usize, height: usize, width: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(steps * width * height);
    for t in 0..steps {
        for row in 0..height {
            for col in 0..width {
                data.push((t * 10000 + col * 100 + row) as f32);
            }
        }
    }
    data
}

/// Evenly spaced time steps starting at `start`.
pub fn create_times(start: DateTime<Utc>, steps: usize, step_hours: i64) -> Vec<DateTime<Utc>> {
    (0..steps)
        .map(|i| start + Duration::hours(i as i64 * step_hours))
        .collect()
}

/// Evenly spaced coordinate axis.
pub fn create_axis(first: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| first + i as f64 * step).collect()
}

/// Creates a Copernicus-style grid with `VHM0` (height, m) and `VTPK`
/// (peak period, s).
///
/// Heights grow from 1 m towards the north-east corner and oscillate
/// slightly in time; periods stay between 8 and 12 s.
pub fn create_wave_grid(
    start: DateTime<Utc>,
    steps: usize,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
) -> WaveGrid {
    let times = create_times(start, steps, 3);
    let (ny, nx) = (latitudes.len(), longitudes.len());
    let mut grid = WaveGrid::new(times, latitudes, longitudes);

    let mut heights = Vec::with_capacity(grid.len());
    let mut periods = Vec::with_capacity(grid.len());
    for t in 0..steps {
        let phase = (t as f32 * 0.5).sin() * 0.1;
        for row in 0..ny {
            for col in 0..nx {
                let x = col as f32 / nx.max(1) as f32;
                let y = row as f32 / ny.max(1) as f32;
                heights.push(1.0 + x + y + phase);
                periods.push(8.0 + 4.0 * x);
            }
        }
    }

    grid.insert_variable("VHM0", heights).expect("heights match grid shape");
    grid.insert_variable("VTPK", periods).expect("periods match grid shape");
    grid
}

/// A small 4-step, 3x4 Copernicus-style grid starting 2020-01-01.
pub fn create_small_wave_grid() -> WaveGrid {
    create_wave_grid(
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        4,
        create_axis(20.0, 0.2, 3),
        create_axis(130.0, 0.2, 4),
    )
}

/// Creates a grid with constant values for a single variable.
pub fn create_constant_grid(
    name: &str,
    times: Vec<DateTime<Utc>>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    value: f32,
) -> WaveGrid {
    let mut grid = WaveGrid::new(times, latitudes, longitudes);
    let values = vec![value; grid.len()];
    grid.insert_variable(name, values).expect("values match grid shape");
    grid
}

/// Copy of `values` with every `nan_every`-th entry replaced by NaN.
pub fn with_nans(values: &[f32], nan_every: usize) -> Vec<f32> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if nan_every > 0 && i % nan_every == 0 {
                f32::NAN
            } else {
                v
            }
        })
        .collect()
}
