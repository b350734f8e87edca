//! Common test fixtures for the ocean data workspace.

/// Common bounding box definitions for testing, as
/// (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Copernicus wave extract around Japan
    pub const JAPAN_WAVES: (f64, f64, f64, f64) = (124.52, 16.745, 144.6, 48.185);

    /// NOAA GEFS wave subset off California
    pub const CALIFORNIA_OFFSHORE: (f64, f64, f64, f64) = (-130.0, 25.0, -120.0, 30.0);

    /// Hawaiian islands
    pub const HAWAII: (f64, f64, f64, f64) = (-161.0, 18.5, -154.5, 22.5);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Time domains used by planner and pipeline tests.
pub mod time {
    /// Two calendar months
    pub const TWO_MONTHS: (&str, &str) = ("2020-01-01T00:00:00Z", "2020-03-01T00:00:00Z");

    /// Starts late in a long month to exercise the day-28 clamp
    pub const LATE_START: (&str, &str) = ("2021-01-31T21:00:00Z", "2021-06-01T00:00:00Z");

    /// Full reanalysis range of the Copernicus wave product
    pub const COPERNICUS_FULL: (&str, &str) = ("1980-01-01T21:00:00Z", "2023-04-30T21:00:00Z");
}

/// Variable names used by the supported products.
pub mod variables {
    pub const COPERNICUS: [&str; 2] = ["VHM0", "VTPK"];
    pub const ERA5: [&str; 2] = ["swh", "mwp"];
}

/// Create a scratch directory that is removed when dropped.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("ocean-test-")
        .tempdir()
        .unwrap_or_else(|e| panic!("failed to create scratch dir: {}", e))
}
