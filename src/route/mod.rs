//! Visiting-order planning for a set of geo-points.
//!
//! - `planner`: corner seed selection and nearest-neighbour greedy tour
//! - `optimize`: strategy entry point, including an open-path 2-opt pass

mod optimize;
mod planner;

pub use optimize::{optimize, Optimization, RoutePlan};
pub use planner::{find_corner, path_length, plan_route, Corner};
