//! Common types shared across the ocean data pipeline crates.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{OceanError, OceanResult};
pub use grid::WaveGrid;
pub use time::TimeRange;
