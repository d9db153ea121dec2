//! Bearing sweep fallback.
//!
//! Employees are sorted by bearing from HQ, starting just after the widest
//! empty sector so that no cluster straddles it. Shuttles are filled in
//! order of decreasing capacity, then each cluster is ordered by nearest
//! neighbour from HQ.

/// Result of a sweep: per-shuttle employee indices in visiting order
/// (shuttles in input order) plus employees that did not fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub routes: Vec<Vec<usize>>,
    pub unassigned: Vec<usize>,
}

/// `bearings[i]` is employee i's bearing from HQ; `costs` is the arc cost
/// matrix with HQ at index 0 and employee i at index i + 1.
pub fn sweep(bearings: &[f64], capacities: &[u32], costs: &[Vec<i64>]) -> SweepResult {
    let mut routes = vec![Vec::new(); capacities.len()];
    if bearings.is_empty() {
        return SweepResult { routes, unassigned: Vec::new() };
    }

    let order = sweep_order(bearings);

    let mut fill_order: Vec<usize> = (0..capacities.len()).collect();
    fill_order.sort_by(|a, b| capacities[*b].cmp(&capacities[*a]));

    let mut shuttles = fill_order.into_iter().filter(|&s| capacities[s] > 0);
    let mut current = shuttles.next();
    let mut unassigned = Vec::new();

    for employee in order {
        while let Some(s) = current {
            if (routes[s].len() as u32) < capacities[s] {
                break;
            }
            current = shuttles.next();
        }
        match current {
            Some(s) => routes[s].push(employee),
            None => unassigned.push(employee),
        }
    }

    for route in routes.iter_mut() {
        *route = order_from_hq(route, costs);
    }

    SweepResult { routes, unassigned }
}

/// Employee indices by ascending bearing, rotated to start after the
/// largest angular gap.
fn sweep_order(bearings: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<usize> = (0..bearings.len()).collect();
    sorted.sort_by(|a, b| bearings[*a].total_cmp(&bearings[*b]));

    if sorted.len() < 2 {
        return sorted;
    }

    let mut best_gap = -1.0;
    let mut start = 0;
    for k in 0..sorted.len() {
        let here = bearings[sorted[k]];
        let next = bearings[sorted[(k + 1) % sorted.len()]];
        let gap = if k + 1 == sorted.len() { next + 360.0 - here } else { next - here };
        if gap > best_gap {
            best_gap = gap;
            start = (k + 1) % sorted.len();
        }
    }

    sorted.rotate_left(start);
    sorted
}

/// Nearest-neighbour order of `members` starting from HQ.
fn order_from_hq(members: &[usize], costs: &[Vec<i64>]) -> Vec<usize> {
    let mut remaining: Vec<usize> = members.to_vec();
    let mut ordered = Vec::with_capacity(members.len());
    let mut current_node = 0;

    while !remaining.is_empty() {
        let (pos, _) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &e)| (pos, costs[current_node][e + 1]))
            .min_by_key(|&(_, c)| c)
            .unwrap_or((0, 0));
        let next = remaining.remove(pos);
        current_node = next + 1;
        ordered.push(next);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cost matrix from planar points (HQ first), Euclidean ×1000.
    fn planar_costs(points: &[(f64, f64)]) -> Vec<Vec<i64>> {
        points
            .iter()
            .map(|a| {
                points
                    .iter()
                    .map(|b| (((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() * 1000.0) as i64)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_sweep_empty() {
        let result = sweep(&[], &[4, 4], &[vec![0]]);
        assert_eq!(result.routes, vec![Vec::<usize>::new(), Vec::new()]);
        assert!(result.unassigned.is_empty());
    }

    #[test]
    fn test_sweep_groups_by_direction() {
        // Two north-east employees and two south-west ones
        let bearings = [40.0, 220.0, 50.0, 230.0];
        let costs = planar_costs(&[(0.0, 0.0), (1.0, 1.0), (-1.0, -1.0), (1.5, 1.5), (-1.5, -1.5)]);
        let result = sweep(&bearings, &[2, 2], &costs);

        let mut groups: Vec<Vec<usize>> = result
            .routes
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.sort();
                r
            })
            .collect();
        groups.sort();
        assert_eq!(groups, vec![vec![0, 2], vec![1, 3]]);
        assert!(result.unassigned.is_empty());
    }

    #[test]
    fn test_sweep_fills_largest_shuttle_first() {
        let bearings = [10.0, 20.0, 30.0];
        let costs = planar_costs(&[(0.0, 0.0), (1.0, 0.1), (1.0, 0.2), (1.0, 0.3)]);
        let result = sweep(&bearings, &[1, 5], &costs);

        assert!(result.routes[0].is_empty());
        assert_eq!(result.routes[1].len(), 3);
    }

    #[test]
    fn test_sweep_reports_overflow() {
        let bearings = [10.0, 20.0, 30.0];
        let costs = planar_costs(&[(0.0, 0.0), (1.0, 0.1), (1.0, 0.2), (1.0, 0.3)]);
        let result = sweep(&bearings, &[1, 1], &costs);

        assert_eq!(result.routes.iter().map(Vec::len).sum::<usize>(), 2);
        assert_eq!(result.unassigned.len(), 1);
    }

    #[test]
    fn test_sweep_order_starts_after_widest_gap() {
        // Cluster around north wraps through 0; the widest gap is 20..340
        let order = sweep_order(&[350.0, 10.0, 340.0, 20.0]);
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_cluster_ordered_from_hq_outward() {
        let costs = planar_costs(&[(0.0, 0.0), (3.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(order_from_hq(&[0, 1, 2], &costs), vec![1, 2, 0]);
    }
}
