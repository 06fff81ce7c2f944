//! Geographic primitives for route handling.
//!
//! # Architecture
//!
//! - `polyline`: Google encoded-polyline codec
//! - `distance`: Great-circle (haversine) distance in meters
//! - `sampling`: Arc-length resampling of decoded paths

pub mod distance;
pub mod polyline;
pub mod sampling;

use serde::{Deserialize, Serialize};

pub use distance::haversine;
pub use polyline::DecodeError;
pub use sampling::{sample_by_distance, SampledPolyline};

/// A single vertex of a path, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A named location produced by geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Coordinates without the name.
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}
