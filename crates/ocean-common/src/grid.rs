//! In-memory gridded wave datasets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, OceanError, OceanResult, TimeRange};

/// A regular time/latitude/longitude dataset with named variables.
///
/// Variable values are stored row-major as `[time][lat][lon]`; missing
/// values are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveGrid {
    pub times: Vec<DateTime<Utc>>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub variables: BTreeMap<String, Vec<f32>>,
}

impl WaveGrid {
    /// Create an empty grid over the given coordinates.
    pub fn new(times: Vec<DateTime<Utc>>, latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        Self {
            times,
            latitudes,
            longitudes,
            variables: BTreeMap::new(),
        }
    }

    /// (time, lat, lon) dimension sizes.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.latitudes.len(), self.longitudes.len())
    }

    /// Number of spatial cells in one time step.
    pub fn grid_points(&self) -> usize {
        self.latitudes.len() * self.longitudes.len()
    }

    /// Number of values each variable must hold.
    pub fn len(&self) -> usize {
        self.times.len() * self.grid_points()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of a (time, lat, lon) position.
    pub fn index(&self, t: usize, y: usize, x: usize) -> usize {
        (t * self.latitudes.len() + y) * self.longitudes.len() + x
    }

    /// Add or replace a variable, checking its length against the grid shape.
    pub fn insert_variable(&mut self, name: impl Into<String>, values: Vec<f32>) -> OceanResult<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(OceanError::InvalidGrid(format!(
                "variable {} has {} values, expected {}",
                name,
                values.len(),
                self.len()
            )));
        }
        self.variables.insert(name, values);
        Ok(())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Borrow a variable's values.
    pub fn variable(&self, name: &str) -> OceanResult<&[f32]> {
        self.variables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| OceanError::VariableNotFound(name.to_string()))
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn value(&self, name: &str, t: usize, y: usize, x: usize) -> Option<f32> {
        let (nt, ny, nx) = self.shape();
        if t >= nt || y >= ny || x >= nx {
            return None;
        }
        self.variables.get(name).map(|v| v[self.index(t, y, x)])
    }

    /// Values of one variable at one time step (lat-major).
    pub fn time_slice(&self, name: &str, t: usize) -> OceanResult<&[f32]> {
        let values = self.variable(name)?;
        let n = self.grid_points();
        values
            .get(t * n..(t + 1) * n)
            .ok_or_else(|| OceanError::InvalidGrid(format!("time index {} out of range", t)))
    }

    /// Keep only cells inside the bbox.
    pub fn subset(&self, bbox: &BoundingBox) -> WaveGrid {
        let t_idx: Vec<usize> = (0..self.times.len()).collect();
        let y_idx: Vec<usize> = (0..self.latitudes.len())
            .filter(|&y| bbox.contains_lat(self.latitudes[y]))
            .collect();
        let x_idx: Vec<usize> = (0..self.longitudes.len())
            .filter(|&x| bbox.contains_lon(self.longitudes[x]))
            .collect();
        self.select(&t_idx, &y_idx, &x_idx)
    }

    /// Keep only time steps inside the half-open range.
    pub fn select_time(&self, range: &TimeRange) -> WaveGrid {
        let t_idx: Vec<usize> = (0..self.times.len())
            .filter(|&t| range.contains(&self.times[t]))
            .collect();
        let y_idx: Vec<usize> = (0..self.latitudes.len()).collect();
        let x_idx: Vec<usize> = (0..self.longitudes.len()).collect();
        self.select(&t_idx, &y_idx, &x_idx)
    }

    fn select(&self, t_idx: &[usize], y_idx: &[usize], x_idx: &[usize]) -> WaveGrid {
        let mut out = WaveGrid::new(
            t_idx.iter().map(|&t| self.times[t]).collect(),
            y_idx.iter().map(|&y| self.latitudes[y]).collect(),
            x_idx.iter().map(|&x| self.longitudes[x]).collect(),
        );

        for (name, values) in &self.variables {
            let mut selected = Vec::with_capacity(out.len());
            for &t in t_idx {
                for &y in y_idx {
                    for &x in x_idx {
                        selected.push(values[self.index(t, y, x)]);
                    }
                }
            }
            out.variables.insert(name.clone(), selected);
        }

        out
    }

    /// Spatial extent of the grid coordinates.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let (min_lat, max_lat) = min_max(&self.latitudes)?;
        let (min_lon, max_lon) = min_max(&self.longitudes)?;
        Some(BoundingBox::new(min_lon, min_lat, max_lon, max_lat))
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> WaveGrid {
        let times = (0..3)
            .map(|h| Utc.with_ymd_and_hms(2020, 1, 1, h * 3, 0, 0).unwrap())
            .collect();
        let mut grid = WaveGrid::new(times, vec![20.0, 21.0], vec![130.0, 131.0, 132.0]);
        let values = (0..grid.len()).map(|i| i as f32).collect();
        grid.insert_variable("VHM0", values).unwrap();
        grid
    }

    #[test]
    fn test_insert_checks_length() {
        let mut grid = sample();
        assert!(grid.insert_variable("VTPK", vec![1.0; 4]).is_err());
    }

    #[test]
    fn test_subset_keeps_inside_cells() {
        let grid = sample();
        let sub = grid.subset(&BoundingBox::new(130.5, 20.5, 132.0, 21.0));
        assert_eq!(sub.shape(), (3, 1, 2));
        // t=0, lat=21.0, lon=131.0 -> index (0*2+1)*3+1 = 4
        assert_eq!(sub.value("VHM0", 0, 0, 0), Some(4.0));
        assert_eq!(sub.value("VHM0", 2, 0, 1), Some(17.0));
    }

    #[test]
    fn test_select_time_drops_end() {
        let grid = sample();
        let range = TimeRange::new(grid.times[0], grid.times[2]);
        let sub = grid.select_time(&range);
        assert_eq!(sub.times.len(), 2);
        assert_eq!(sub.variable("VHM0").unwrap().len(), 12);
    }

    #[test]
    fn test_bbox_extent() {
        let bbox = sample().bbox().unwrap();
        assert_eq!(bbox, BoundingBox::new(130.0, 20.0, 132.0, 21.0));
    }
}
