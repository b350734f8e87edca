//! Error types for the wave-power crate.

use thiserror::Error;

/// Errors raised while deriving wave power products.
#[derive(Error, Debug)]
pub enum WavePowerError {
    #[error("Could not find wave height and period variables (tried {0})")]
    MissingWaveVariables(String),

    #[error("Dataset must contain the {0} variable")]
    MissingPowerFlux(String),

    #[error("Length mismatch: {0}")]
    LengthMismatch(String),

    #[error(transparent)]
    Grid(#[from] ocean_common::OceanError),
}

/// Result type for wave-power operations.
pub type Result<T> = std::result::Result<T, WavePowerError>;
