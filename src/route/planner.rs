//! Greedy nearest-neighbour tour construction.
//!
//! Distances here are plain Euclidean in (latitude, longitude) degree space,
//! not geodesic. Ordering quality degrades near the poles and across the
//! antimeridian; the planner only needs a reasonable visiting order.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Extreme corner of a point set used to seed a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Corner {
    #[default]
    Southwest,
    Northwest,
    Southeast,
    Northeast,
}

impl Corner {
    /// Whether `candidate` beats `current` for this corner.
    ///
    /// Longitude decides first, latitude breaks ties. Equal points never
    /// beat each other, so the first one seen wins.
    fn improves(self, candidate: &GeoPoint, current: &GeoPoint) -> bool {
        let (west, south) = match self {
            Corner::Southwest => (true, true),
            Corner::Northwest => (true, false),
            Corner::Southeast => (false, true),
            Corner::Northeast => (false, false),
        };

        let lng_better = if west {
            candidate.longitude < current.longitude
        } else {
            candidate.longitude > current.longitude
        };
        let lat_better = if south {
            candidate.latitude < current.latitude
        } else {
            candidate.latitude > current.latitude
        };

        lng_better || (candidate.longitude == current.longitude && lat_better)
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "southwest" | "sw" => Ok(Corner::Southwest),
            "northwest" | "nw" => Ok(Corner::Northwest),
            "southeast" | "se" => Ok(Corner::Southeast),
            "northeast" | "ne" => Ok(Corner::Northeast),
            other => Err(format!("unknown corner '{other}'")),
        }
    }
}

/// Euclidean distance in degree space.
fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    ((a.latitude - b.latitude).powi(2) + (a.longitude - b.longitude).powi(2)).sqrt()
}

/// Index of the point at `corner`, or `None` for an empty slice.
pub fn find_corner(points: &[GeoPoint], corner: Corner) -> Option<usize> {
    if points.is_empty() {
        return None;
    }

    let mut best = 0;
    for (i, point) in points.iter().enumerate().skip(1) {
        if corner.improves(point, &points[best]) {
            best = i;
        }
    }

    Some(best)
}

/// Order `points` into a visiting route starting from `corner`.
///
/// Each step moves to the closest unvisited point; ties go to the point that
/// appears first in the remaining input order. Zero or one point is returned
/// unchanged.
pub fn plan_route(points: &[GeoPoint], corner: Corner) -> Vec<GeoPoint> {
    let Some(start) = find_corner(points, corner) else {
        return Vec::new();
    };
    if points.len() == 1 {
        return points.to_vec();
    }

    let mut unvisited: Vec<&GeoPoint> = points.iter().collect();
    let mut current = unvisited.remove(start);
    let mut route = Vec::with_capacity(points.len());
    route.push(current.clone());

    while !unvisited.is_empty() {
        let mut nearest = 0;
        let mut min_distance = f64::INFINITY;

        for (i, candidate) in unvisited.iter().enumerate() {
            let d = distance(current, candidate);
            if d < min_distance {
                min_distance = d;
                nearest = i;
            }
        }

        current = unvisited.remove(nearest);
        route.push(current.clone());
    }

    route
}

/// Total Euclidean degree-space length of an open path.
pub fn path_length(route: &[GeoPoint]) -> f64 {
    route.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn point(name: &str, latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(name, latitude, longitude)
    }

    fn names(route: &[GeoPoint]) -> Vec<&str> {
        route.iter().map(|p| p.name.as_str()).collect()
    }

    fn square() -> Vec<GeoPoint> {
        vec![
            point("ne", 1.0, 1.0),
            point("sw", 0.0, 0.0),
            point("nw", 1.0, 0.0),
            point("se", 0.0, 1.0),
        ]
    }

    #[test]
    fn test_find_corner_each_direction() {
        let points = square();
        assert_eq!(find_corner(&points, Corner::Southwest), Some(1));
        assert_eq!(find_corner(&points, Corner::Northwest), Some(2));
        assert_eq!(find_corner(&points, Corner::Southeast), Some(3));
        assert_eq!(find_corner(&points, Corner::Northeast), Some(0));
    }

    #[test]
    fn test_find_corner_longitude_dominates() {
        // lower latitude but further east loses to the western point
        let points = vec![point("a", -10.0, 5.0), point("b", 10.0, 4.0)];
        assert_eq!(find_corner(&points, Corner::Southwest), Some(1));
    }

    #[test]
    fn test_find_corner_ties_keep_first() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.0, 0.0)];
        for corner in [
            Corner::Southwest,
            Corner::Northwest,
            Corner::Southeast,
            Corner::Northeast,
        ] {
            assert_eq!(find_corner(&points, corner), Some(0));
        }
    }

    #[test]
    fn test_find_corner_empty() {
        assert_eq!(find_corner(&[], Corner::Southwest), None);
    }

    #[test]
    fn test_find_corner_deterministic() {
        let points = square();
        let first = find_corner(&points, Corner::Northeast);
        assert_eq!(first, find_corner(&points, Corner::Northeast));
    }

    #[test]
    fn test_plan_two_points() {
        let a = point("A", 0.0, 0.0);
        let b = point("B", 0.0, 1.0);

        let route = plan_route(&[b.clone(), a.clone()], Corner::Southwest);
        assert_eq!(route, vec![a, b]);
    }

    #[test]
    fn test_plan_trivial_inputs() {
        assert!(plan_route(&[], Corner::Southwest).is_empty());

        let single = vec![point("only", 3.0, 4.0)];
        assert_eq!(plan_route(&single, Corner::Northeast), single);
    }

    #[test]
    fn test_plan_walks_a_line() {
        let points = vec![
            point("c", 0.0, 2.0),
            point("a", 0.0, 0.0),
            point("d", 0.0, 3.0),
            point("b", 0.0, 1.0),
        ];
        let route = plan_route(&points, Corner::Southwest);
        assert_eq!(names(&route), vec!["a", "b", "c", "d"]);

        let route = plan_route(&points, Corner::Northeast);
        assert_eq!(names(&route), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_plan_tie_goes_to_first_remaining() {
        // "right" and "up" are equidistant from the seed
        let points = vec![
            point("seed", 0.0, 0.0),
            point("right", 0.0, 1.0),
            point("up", 1.0, 0.0),
        ];
        let route = plan_route(&points, Corner::Southwest);
        assert_eq!(names(&route), vec!["seed", "right", "up"]);
    }

    #[test]
    fn test_plan_is_permutation() {
        let mut rng = StdRng::seed_from_u64(42);

        for n in 0..30 {
            let points: Vec<GeoPoint> = (0..n)
                .map(|i| {
                    point(
                        &format!("p{i}"),
                        rng.random_range(-60.0..60.0),
                        rng.random_range(-170.0..170.0),
                    )
                })
                .collect();

            let route = plan_route(&points, Corner::Southwest);
            assert_eq!(route.len(), points.len());

            let mut expected = names(&points);
            let mut got = names(&route);
            expected.sort();
            got.sort();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_corner_from_str() {
        assert_eq!("southwest".parse::<Corner>(), Ok(Corner::Southwest));
        assert_eq!("NE".parse::<Corner>(), Ok(Corner::Northeast));
        assert!("middle".parse::<Corner>().is_err());
    }

    #[test]
    fn test_path_length() {
        let route = vec![point("a", 0.0, 0.0), point("b", 0.0, 3.0), point("c", 4.0, 3.0)];
        assert!((path_length(&route) - 7.0).abs() < 1e-12);
        assert_eq!(path_length(&route[..1]), 0.0);
    }
}
