//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Reject inverted or out-of-range boxes.
    pub fn validate(&self) -> Result<(), BboxError> {
        if self.min_lon > self.max_lon || self.min_lat > self.max_lat {
            return Err(BboxError::Inverted(self.to_string()));
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err(BboxError::OutOfRange(self.to_string()));
        }
        Ok(())
    }

    /// Edges are inclusive.
    pub fn contains_lon(&self, lon: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxError {
    #[error("Inverted bbox (min greater than max): {0}")]
    Inverted(String),

    #[error("Latitude out of range in bbox: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let bbox = BoundingBox::new(-130.0, 25.0, -120.0, 30.0);
        assert!(bbox.contains_lon(-130.0));
        assert!(bbox.contains_lon(-120.0));
        assert!(!bbox.contains_lon(-119.9));
        assert!(bbox.contains_lat(25.0));
        assert!(!bbox.contains_lat(30.01));
    }
}
