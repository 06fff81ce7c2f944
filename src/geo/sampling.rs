//! Arc-length resampling of decoded paths.
//!
//! Downstream geo queries run once per sampled point, so a route is reduced
//! to points spaced at least a minimum distance apart along the path.

use serde::Serialize;

use super::distance::{haversine, path_length};
use super::polyline::{self, DecodeError};
use super::LatLng;

/// Paths longer than this are displayed through their samples only.
pub const MAX_DISPLAY_POINTS: usize = 1000;

/// Resample `points` so consecutive samples are at least `min_interval_m`
/// meters apart along the path.
///
/// The first point is always kept. Distance accumulates between consecutive
/// raw points; once it reaches the interval the current point is emitted and
/// the accumulator resets. The last point is appended if it was not emitted.
pub fn sample_by_distance(points: &[LatLng], min_interval_m: f64) -> Vec<LatLng> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };

    let mut samples = vec![first];
    let mut last_emitted = 0;
    let mut accumulated = 0.0;

    for (i, pair) in points.windows(2).enumerate() {
        accumulated += haversine(pair[0], pair[1]);

        if accumulated >= min_interval_m {
            samples.push(pair[1]);
            last_emitted = i + 1;
            accumulated = 0.0;
        }
    }

    let last = points.len() - 1;
    if last_emitted != last {
        samples.push(points[last]);
    }

    samples
}

/// A decoded directions polyline together with its resampled query points.
#[derive(Debug, Clone, Serialize)]
pub struct SampledPolyline {
    pub points: Vec<LatLng>,
    pub samples: Vec<LatLng>,
}

impl SampledPolyline {
    /// Decode `encoded` and resample it at `min_interval_m`.
    pub fn from_encoded(encoded: &str, min_interval_m: f64) -> Result<Self, DecodeError> {
        let points = polyline::decode(encoded)?;
        let samples = sample_by_distance(&points, min_interval_m);

        log::debug!(
            "sampled {} of {} polyline points at {}m",
            samples.len(),
            points.len(),
            min_interval_m
        );

        Ok(Self { points, samples })
    }

    /// Points suitable for returning to a map client: the full path when it is
    /// small, the samples otherwise.
    pub fn display_points(&self) -> &[LatLng] {
        if self.points.len() <= MAX_DISPLAY_POINTS {
            &self.points
        } else {
            &self.samples
        }
    }

    /// Length of the full path in meters.
    pub fn path_length(&self) -> f64 {
        path_length(&self.points)
    }
}
