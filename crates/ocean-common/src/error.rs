//! Error types shared by the ocean data crates.

use thiserror::Error;

/// Result type alias using OceanError.
pub type OceanResult<T> = Result<T, OceanError>;

/// Primary error type for shared operations.
#[derive(Debug, Error)]
pub enum OceanError {
    // === Input Errors ===
    #[error("Invalid bbox: {0}")]
    InvalidBbox(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    // === Data Errors ===
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OceanError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OceanError::StorageError(_) | OceanError::Io(_))
    }
}

impl From<crate::bbox::BboxError> for OceanError {
    fn from(err: crate::bbox::BboxError) -> Self {
        OceanError::InvalidBbox(err.to_string())
    }
}

impl From<crate::time::TimeParseError> for OceanError {
    fn from(err: crate::time::TimeParseError) -> Self {
        OceanError::InvalidTime(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(OceanError::StorageError("throttled".into()).is_transient());
        assert!(!OceanError::VariableNotFound("VHM0".into()).is_transient());
    }
}
