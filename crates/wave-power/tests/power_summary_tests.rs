//! End-to-end tests for wave power derivation on synthetic grids.

use test_utils::{
    assert_approx_eq, create_axis, create_constant_grid, create_small_wave_grid, create_times,
};
use wave_power::{
    add_power_flux, monthly_aggregations, processing_summary, rank_sites, time_mean,
    wave_power_flux, PhysicalConstants, WavePowerError, POWER_FLUX_VARIABLE,
};

use chrono::{TimeZone, Utc};

// ============================================================================
// Flux derivation
// ============================================================================

#[test]
fn test_add_power_flux_copernicus_variables() {
    let mut grid = create_small_wave_grid();
    let constants = PhysicalConstants::default();
    add_power_flux(&mut grid, &constants).unwrap();

    let h = grid.value("VHM0", 1, 2, 3).unwrap() as f64;
    let t = grid.value("VTPK", 1, 2, 3).unwrap() as f64;
    let p = grid.value(POWER_FLUX_VARIABLE, 1, 2, 3).unwrap() as f64;
    assert_approx_eq!(p, wave_power_flux(h, t, &constants), 0.01);
}

#[test]
fn test_add_power_flux_era5_variables() {
    let times = create_times(Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(), 2, 6);
    let mut grid = create_constant_grid(
        "swh",
        times,
        create_axis(25.0, 1.0, 2),
        create_axis(-130.0, 1.0, 2),
        2.0,
    );
    let mwp = vec![10.0; grid.len()];
    grid.insert_variable("mwp", mwp).unwrap();

    add_power_flux(&mut grid, &PhysicalConstants::default()).unwrap();
    // 490.605 * 4 * 10
    assert_approx_eq!(grid.value(POWER_FLUX_VARIABLE, 0, 0, 0).unwrap(), 19624.2, 0.1);
}

#[test]
fn test_add_power_flux_grib_variables() {
    let times = create_times(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(), 2, 3);
    let mut grid = create_constant_grid(
        "HTSGW",
        times,
        create_axis(25.0, 0.25, 3),
        create_axis(-130.0, 0.25, 3),
        3.0,
    );
    grid.insert_variable("PERPW", vec![12.0; grid.len()]).unwrap();

    add_power_flux(&mut grid, &PhysicalConstants::default()).unwrap();
    // 490.605 * 9 * 12
    assert_approx_eq!(grid.value(POWER_FLUX_VARIABLE, 1, 2, 2).unwrap(), 52985.3, 0.1);
}

#[test]
fn test_add_power_flux_missing_variables() {
    let times = create_times(Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(), 1, 6);
    let mut grid = create_constant_grid("temperature", times, vec![0.0], vec![0.0], 1.0);
    let result = add_power_flux(&mut grid, &PhysicalConstants::default());
    assert!(matches!(result, Err(WavePowerError::MissingWaveVariables(_))));
}

// ============================================================================
// Summaries
// ============================================================================

#[test]
fn test_summary_requires_power_flux() {
    let grid = create_small_wave_grid();
    assert!(matches!(
        processing_summary(&grid, "Test"),
        Err(WavePowerError::MissingPowerFlux(_))
    ));
}

#[test]
fn test_summary_coverage() {
    let mut grid = create_small_wave_grid();
    add_power_flux(&mut grid, &PhysicalConstants::default()).unwrap();

    let summary = processing_summary(&grid, "East China Sea").unwrap();
    assert_eq!(summary.region, "East China Sea");
    assert_eq!(summary.data_coverage.total_timesteps, 4);
    assert_eq!(summary.data_coverage.start_date.as_deref(), Some("2020-01-01"));

    let spatial = summary.spatial_coverage.as_ref().unwrap();
    assert_eq!(spatial.grid_points, 12);
    assert_approx_eq!(spatial.lat_min, 20.0, 1e-9);
    assert_approx_eq!(spatial.lon_max, 130.6, 1e-9);

    let stats = &summary.wave_power_statistics;
    assert!(stats.min_power_w_per_m <= stats.mean_power_w_per_m);
    assert!(stats.mean_power_w_per_m <= stats.max_power_w_per_m);

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json["consistency_metrics"]["threshold_value"].is_number());
}

#[test]
fn test_ranking_matches_time_mean_maximum() {
    let mut grid = create_small_wave_grid();
    add_power_flux(&mut grid, &PhysicalConstants::default()).unwrap();

    let mean = time_mean(&grid, POWER_FLUX_VARIABLE).unwrap();
    let sites = rank_sites(&mean, &grid.latitudes, &grid.longitudes, 1).unwrap();

    // Height and period both grow north-east, so the corner cell wins.
    assert_eq!(sites.len(), 1);
    assert_approx_eq!(sites[0].latitude, 20.4, 1e-9);
    assert_approx_eq!(sites[0].longitude, 130.6, 1e-9);
}

#[test]
fn test_monthly_single_month() {
    let mut grid = create_small_wave_grid();
    add_power_flux(&mut grid, &PhysicalConstants::default()).unwrap();

    let monthly = monthly_aggregations(&grid, POWER_FLUX_VARIABLE).unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].month, 1);
    assert_eq!(monthly[0].time_steps, 4);
    assert_eq!(monthly[0].mean.len(), grid.grid_points());
}
