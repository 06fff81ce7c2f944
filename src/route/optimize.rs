//! Route optimisation strategies.

use serde::{Deserialize, Serialize};

use super::planner::{plan_route, Corner};
use crate::geo::{self, GeoPoint, LatLng};

/// Upper bound on full 2-opt sweeps.
const MAX_TWO_OPT_PASSES: usize = 64;

/// Improvements smaller than this are treated as noise.
const EPSILON: f64 = 1e-12;

/// Heuristic used to order a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Optimization {
    /// Nearest-neighbour tour only.
    #[default]
    Greedy,
    /// Greedy tour refined by segment reversals.
    TwoOpt,
}

/// Order `points` from `corner` using `method`.
///
/// Every method returns a permutation of the input that starts at the same
/// corner point as the greedy tour.
pub fn optimize(points: &[GeoPoint], corner: Corner, method: Optimization) -> Vec<GeoPoint> {
    let mut route = plan_route(points, corner);

    match method {
        Optimization::Greedy => {}
        Optimization::TwoOpt => {
            let passes = two_opt(&mut route);
            log::debug!("2-opt settled after {passes} passes on {} points", route.len());
        }
    }

    route
}

/// An ordered route and its great-circle length in meters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub route: Vec<GeoPoint>,
    pub length: f64,
}

impl RoutePlan {
    pub fn new(points: &[GeoPoint], corner: Corner, method: Optimization) -> Self {
        let route = optimize(points, corner, method);
        let positions: Vec<LatLng> = route.iter().map(GeoPoint::position).collect();
        let length = geo::distance::path_length(&positions);
        Self { route, length }
    }
}

fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    ((a.latitude - b.latitude).powi(2) + (a.longitude - b.longitude).powi(2)).sqrt()
}

/// Open-path 2-opt with the first point pinned.
///
/// Reversing `route[i + 1..=j]` replaces edges (i, i+1) and (j, j+1) with
/// (i, j) and (i+1, j+1); when `j` is the last point only the first edge
/// changes. Returns the number of sweeps performed.
fn two_opt(route: &mut [GeoPoint]) -> usize {
    let n = route.len();
    if n < 3 {
        return 0;
    }

    let mut passes = 0;
    loop {
        passes += 1;
        let mut improved = false;

        for i in 0..n - 2 {
            for j in i + 2..n {
                let before_tail = route.get(j + 1).map_or(0.0, |next| distance(&route[j], next));
                let after_tail = route
                    .get(j + 1)
                    .map_or(0.0, |next| distance(&route[i + 1], next));

                let before = distance(&route[i], &route[i + 1]) + before_tail;
                let after = distance(&route[i], &route[j]) + after_tail;

                if after + EPSILON < before {
                    route[i + 1..=j].reverse();
                    improved = true;
                }
            }
        }

        if !improved || passes >= MAX_TWO_OPT_PASSES {
            return passes;
        }
    }
}
