//! Combined distance/bearing arc cost.
//!
//! Arcs that continue in the direction the shuttle left HQ are cheap; arcs
//! that turn sharply or run long are penalized so that clusters follow
//! corridors out of HQ rather than zig-zagging across town.

use crate::services::geo::{bearing, bearing_difference};
use crate::services::routing::DistanceTimeMatrices;
use crate::types::Coordinates;

const NEAR_KM: f64 = 3.0;
const FAR_KM: f64 = 5.0;
const SHARP_TURN_DEG: f64 = 120.0;

/// Cost of travelling `distance_km` along `arc_bearing` after arriving on
/// `heading` (bearing of the node as seen from HQ; 0 when leaving HQ).
pub fn arc_cost(distance_km: f64, heading: f64, arc_bearing: f64) -> i64 {
    let change = bearing_difference(arc_bearing, heading);

    let mut distance_factor = if distance_km > NEAR_KM { 1.2 } else { 1.0 };
    let mut bearing_penalty = (change / 180.0) * distance_km * 0.8;

    if change > SHARP_TURN_DEG {
        bearing_penalty *= 1.5;
    }
    if distance_km > FAR_KM {
        distance_factor *= 1.3;
    }

    (distance_km * distance_factor * 1000.0 + bearing_penalty * 800.0) as i64
}

/// Arc cost matrix over `points` (index 0 = HQ) using the road distances of
/// `matrices`. Diagonal is zero.
pub fn combined_cost_matrix(points: &[Coordinates], matrices: &DistanceTimeMatrices) -> Vec<Vec<i64>> {
    let n = points.len();
    let mut costs = vec![vec![0i64; n]; n];
    if n == 0 {
        return costs;
    }

    let hq = points[0];
    let headings: Vec<f64> = points
        .iter()
        .enumerate()
        .map(|(i, p)| if i == 0 { 0.0 } else { bearing(&hq, p) })
        .collect();

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let distance_km = matrices.distance(i, j) as f64 / 1000.0;
            let arc_bearing = bearing(&points[i], &points[j]);
            costs[i][j] = arc_cost(distance_km, headings[i], arc_bearing);
        }
    }

    costs
}
