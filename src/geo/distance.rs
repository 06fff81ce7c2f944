//! Great-circle distance.

use super::LatLng;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
///
/// Inputs are degrees; the computation runs in radians.
pub fn haversine(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Total haversine length of a path, in meters.
pub fn path_length(points: &[LatLng]) -> f64 {
    points.windows(2).map(|w| haversine(w[0], w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = LatLng::new(47.6062, -122.3321);
        assert_eq!(haversine(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(1.0, 0.0);

        // 6_371_000 * pi / 180
        let expected = 111_194.926_644_558_7;
        assert!((haversine(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric() {
        let seattle = LatLng::new(47.6062, -122.3321);
        let portland = LatLng::new(45.5152, -122.6784);

        let there = haversine(seattle, portland);
        let back = haversine(portland, seattle);
        assert!((there - back).abs() < 1e-9);
        // roughly 234 km apart
        assert!(there > 230_000.0 && there < 240_000.0);
    }

    #[test]
    fn test_path_length_sums_segments() {
        let path = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(0.0, 2.0),
        ];
        let direct = haversine(path[0], path[2]);
        assert!((path_length(&path) - direct).abs() < 1e-6);
        assert_eq!(path_length(&path[..1]), 0.0);
        assert_eq!(path_length(&[]), 0.0);
    }
}
