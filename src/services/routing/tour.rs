//! Closed-tour heuristics over a distance matrix.
//!
//! Index 0 is the depot; a tour is the visiting order of indices 1..n and
//! implicitly starts and ends at the depot.

/// Greedy nearest-neighbour tour starting from the depot.
pub fn nearest_neighbor(distances: &[Vec<u64>]) -> Vec<usize> {
    let n = distances.len();
    if n <= 1 {
        return Vec::new();
    }

    let mut visited = vec![false; n];
    visited[0] = true;
    let mut tour = Vec::with_capacity(n - 1);
    let mut current = 0;

    for _ in 1..n {
        let mut best: Option<(usize, u64)> = None;
        for candidate in 1..n {
            if visited[candidate] {
                continue;
            }
            let d = distances[current][candidate];
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((candidate, d));
            }
        }
        let Some((next, _)) = best else { break };
        visited[next] = true;
        tour.push(next);
        current = next;
    }

    tour
}

/// Total length of depot -> tour... -> depot.
pub fn tour_length(distances: &[Vec<u64>], tour: &[usize]) -> u64 {
    let mut total = 0u64;
    let mut prev = 0;
    for &node in tour {
        total = total.saturating_add(distances[prev][node]);
        prev = node;
    }
    total.saturating_add(distances[prev][0])
}

/// 2-opt improvement until no reversing move shortens the tour.
pub fn two_opt(distances: &[Vec<u64>], tour: &mut Vec<usize>) {
    if tour.len() < 3 {
        return;
    }

    // Work on the closed path with the depot at both ends.
    let mut path = Vec::with_capacity(tour.len() + 2);
    path.push(0);
    path.extend_from_slice(tour);
    path.push(0);

    let dist = |a: usize, b: usize| distances[a][b] as i128;
    let mut improved = true;
    while improved {
        improved = false;
        for i in 1..path.len() - 2 {
            for j in i + 1..path.len() - 1 {
                let before = dist(path[i - 1], path[i]) + dist(path[j], path[j + 1]);
                let after = dist(path[i - 1], path[j]) + dist(path[i], path[j + 1]);
                if after < before {
                    path[i..=j].reverse();
                    improved = true;
                }
            }
        }
    }

    tour.clear();
    tour.extend_from_slice(&path[1..path.len() - 1]);
}
