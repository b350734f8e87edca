//! Revenue potential and site ranking.

use serde::Serialize;

use crate::error::{Result, WavePowerError};

/// Hours of continuous operation per year.
pub const HOURS_PER_YEAR: f64 = 8760.0;
const WATTS_TO_MEGAWATTS: f64 = 1e-6;

/// Annual revenue potential in $/m/year for each power value (W/m).
pub fn revenue_surface(power_flux: &[f32], energy_price_per_mwh: f64) -> Vec<f64> {
    power_flux
        .iter()
        .map(|&p| p as f64 * HOURS_PER_YEAR * WATTS_TO_MEGAWATTS * energy_price_per_mwh)
        .collect()
}

/// One ranked grid cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSite {
    pub rank: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub wave_power_flux_w_per_m: f64,
    pub location_description: String,
}

/// Rank cells of a lat-major 2D field by descending power.
///
/// NaN cells are dropped; ties keep grid order.
pub fn rank_sites(
    power_flux: &[f32],
    latitudes: &[f64],
    longitudes: &[f64],
    top_n: usize,
) -> Result<Vec<RankedSite>> {
    let expected = latitudes.len() * longitudes.len();
    if power_flux.len() != expected {
        return Err(WavePowerError::LengthMismatch(format!(
            "{} values for a {}x{} grid",
            power_flux.len(),
            latitudes.len(),
            longitudes.len()
        )));
    }

    let mut cells: Vec<(usize, f32)> = power_flux
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .collect();
    cells.sort_by(|a, b| b.1.total_cmp(&a.1));

    let nx = longitudes.len();
    Ok(cells
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (cell, power))| RankedSite {
            rank: i + 1,
            latitude: latitudes[cell / nx],
            longitude: longitudes[cell % nx],
            wave_power_flux_w_per_m: power as f64,
            location_description: format!("Site {}", i + 1),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_surface() {
        // 10 kW/m for a year at $50/MWh
        let revenue = revenue_surface(&[10_000.0], 50.0);
        assert!((revenue[0] - 4380.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_sites() {
        let power = [5.0, f32::NAN, 9.0, 1.0, 9.0, 3.0];
        let sites = rank_sites(&power, &[10.0, 11.0], &[20.0, 21.0, 22.0], 3).unwrap();

        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].rank, 1);
        assert_eq!((sites[0].latitude, sites[0].longitude), (10.0, 22.0));
        assert_eq!((sites[1].latitude, sites[1].longitude), (11.0, 21.0));
        assert_eq!(sites[2].wave_power_flux_w_per_m, 5.0);
        assert_eq!(sites[2].location_description, "Site 3");
    }

    #[test]
    fn test_rank_sites_shape_mismatch() {
        assert!(rank_sites(&[1.0], &[10.0, 11.0], &[20.0], 5).is_err());
    }
}
