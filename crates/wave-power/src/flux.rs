//! Deep-water wave power flux.
//!
//! P = (ρ g² / 64π) · H² · T
//!
//! - P: wave power per unit crest width (W/m)
//! - ρ: seawater density (kg/m³)
//! - g: gravitational acceleration (m/s²)
//! - H: significant wave height (m)
//! - T: wave period (s)

use std::f64::consts::PI;

use ocean_common::WaveGrid;
use tracing::debug;

use crate::error::{Result, WavePowerError};

/// Name of the derived variable inserted into grids.
pub const POWER_FLUX_VARIABLE: &str = "wave_power_flux";

/// (height, period) variable pairs in lookup order: Copernicus, ERA5, then
/// GRIB2 short names (NOAA wave models).
pub const WAVE_VARIABLE_PAIRS: [(&str, &str); 3] =
    [("VHM0", "VTPK"), ("swh", "mwp"), ("HTSGW", "PERPW")];

/// Physical constants used by the flux formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalConstants {
    pub water_density: f64,
    pub gravity: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            water_density: 1025.0,
            gravity: 9.81,
        }
    }
}

impl PhysicalConstants {
    /// ρ g² / 64π
    pub fn flux_coefficient(&self) -> f64 {
        self.water_density * self.gravity.powi(2) / (64.0 * PI)
    }
}

/// Wave power flux in W/m for one height/period pair.
pub fn wave_power_flux(height: f64, period: f64, constants: &PhysicalConstants) -> f64 {
    constants.flux_coefficient() * height.powi(2) * period
}

/// Element-wise flux; NaN inputs propagate.
pub fn power_flux_values(
    heights: &[f32],
    periods: &[f32],
    constants: &PhysicalConstants,
) -> Result<Vec<f32>> {
    if heights.len() != periods.len() {
        return Err(WavePowerError::LengthMismatch(format!(
            "{} heights vs {} periods",
            heights.len(),
            periods.len()
        )));
    }

    let coefficient = constants.flux_coefficient();
    Ok(heights
        .iter()
        .zip(periods)
        .map(|(&h, &t)| (coefficient * (h as f64).powi(2) * t as f64) as f32)
        .collect())
}

/// Find the height/period variables a grid carries.
pub fn wave_variables(grid: &WaveGrid) -> Result<(&'static str, &'static str)> {
    WAVE_VARIABLE_PAIRS
        .iter()
        .copied()
        .find(|(h, t)| grid.has_variable(h) && grid.has_variable(t))
        .ok_or_else(|| {
            let tried: Vec<String> = WAVE_VARIABLE_PAIRS
                .iter()
                .map(|(h, t)| format!("{}/{}", h, t))
                .collect();
            WavePowerError::MissingWaveVariables(tried.join(", "))
        })
}

/// Compute flux for the whole grid and store it as [`POWER_FLUX_VARIABLE`].
pub fn add_power_flux(grid: &mut WaveGrid, constants: &PhysicalConstants) -> Result<()> {
    let (height_var, period_var) = wave_variables(grid)?;
    let flux = power_flux_values(
        grid.variable(height_var)?,
        grid.variable(period_var)?,
        constants,
    )?;

    debug!(
        height = height_var,
        period = period_var,
        values = flux.len(),
        "Computed wave power flux"
    );

    grid.insert_variable(POWER_FLUX_VARIABLE, flux)?;
    Ok(())
}
