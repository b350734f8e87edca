//! Wave power resource assessment.
//!
//! Pure functions that derive wave power flux (W/m) from significant wave
//! height and period, and summarize it over time and space:
//!
//! - [`flux`]: the deep-water power flux formula and grid-level helpers
//! - [`stats`]: NaN-aware descriptive statistics and consistency metrics
//! - [`aggregate`]: monthly and seasonal aggregations over the time axis
//! - [`sites`]: revenue surfaces and site ranking
//! - [`summary`]: a serializable processing summary for one dataset

pub mod aggregate;
pub mod error;
pub mod flux;
pub mod sites;
pub mod stats;
pub mod summary;

pub use aggregate::{monthly_aggregations, seasonal_ratio, time_mean, MonthlyStats};
pub use error::{Result, WavePowerError};
pub use flux::{
    add_power_flux, power_flux_values, wave_power_flux, PhysicalConstants, POWER_FLUX_VARIABLE,
};
pub use sites::{rank_sites, revenue_surface, RankedSite};
pub use stats::{consistency_metrics, ConsistencyMetrics};
pub use summary::{processing_summary, ProcessingSummary};
