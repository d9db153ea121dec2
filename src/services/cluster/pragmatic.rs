//! vrp-pragmatic solver integration for capacitated clustering.
//!
//! Every shuttle becomes its own vehicle type with a one-dimensional seat
//! capacity; every employee is a delivery job of demand 1 dropped off on a
//! tour that starts and ends at HQ (matrix index 0).

use std::collections::HashMap;
use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use vrp_cli::extensions::solve::config::{Config, TerminationConfig, create_builder_from_config};
use vrp_core::solver::Solver;
use vrp_pragmatic::format::problem::{Matrix, PragmaticProblem, Problem};
use vrp_pragmatic::format::solution::{PragmaticOutputType, Solution as PragmaticSolution, write_pragmatic};

use crate::services::routing::DistanceTimeMatrices;
use super::SolverConfig;

pub const PROFILE: &str = "car";

/// Tours are not time-bound; any fixed day works as the shift.
const SHIFT_START: &str = "2026-01-01T00:00:00Z";
const SHIFT_END: &str = "2026-01-02T00:00:00Z";

/// Solver output: employee indices per shuttle index, plus unassigned ones.
#[derive(Debug, Clone, Default)]
pub struct PragmaticAssignment {
    pub routes: Vec<Vec<usize>>,
    pub unassigned: Vec<usize>,
}

fn vehicle_id(shuttle: usize) -> String {
    format!("shuttle_{}", shuttle)
}

fn job_id(employee: usize) -> String {
    format!("employee_{}", employee)
}

/// Build the pragmatic problem JSON. Matrix index i + 1 is employee i.
pub fn build_problem(employee_count: usize, capacities: &[u32]) -> Value {
    let jobs: Vec<Value> = (0..employee_count)
        .map(|i| {
            json!({
                "id": job_id(i),
                "deliveries": [{
                    "places": [{
                        "location": { "index": i + 1 },
                        "duration": 0
                    }],
                    "demand": [1]
                }]
            })
        })
        .collect();

    let vehicles: Vec<Value> = capacities
        .iter()
        .enumerate()
        .map(|(s, capacity)| {
            json!({
                "typeId": format!("type_{}", s),
                "vehicleIds": [vehicle_id(s)],
                "profile": { "matrix": PROFILE },
                "costs": {
                    "fixed": 0.0,
                    "distance": 1.0,
                    "time": 0.01
                },
                "shifts": [{
                    "start": {
                        "earliest": SHIFT_START,
                        "location": { "index": 0 }
                    },
                    "end": {
                        "latest": SHIFT_END,
                        "location": { "index": 0 }
                    }
                }],
                "capacity": [capacity]
            })
        })
        .collect();

    json!({
        "plan": { "jobs": jobs },
        "fleet": {
            "vehicles": vehicles,
            "profiles": [{ "name": PROFILE }]
        }
    })
}

/// Routing matrix whose "distances" are the combined arc costs, so the
/// solver minimizes them while durations stay real.
pub fn build_matrix(costs: &[Vec<i64>], matrices: &DistanceTimeMatrices) -> Matrix {
    let size = costs.len();
    let mut travel_times = Vec::with_capacity(size * size);
    let mut distances = Vec::with_capacity(size * size);

    for i in 0..size {
        for j in 0..size {
            travel_times.push(matrices.duration(i, j).min(i64::MAX as u64) as i64);
            distances.push(costs[i][j]);
        }
    }

    Matrix {
        profile: Some(PROFILE.to_string()),
        timestamp: None,
        travel_times,
        distances,
        error_codes: None,
    }
}

pub fn solve_pragmatic(
    capacities: &[u32],
    costs: &[Vec<i64>],
    matrices: &DistanceTimeMatrices,
    config: &SolverConfig,
) -> Result<PragmaticAssignment> {
    let employee_count = costs.len().saturating_sub(1);
    if employee_count == 0 {
        return Ok(PragmaticAssignment {
            routes: vec![Vec::new(); capacities.len()],
            unassigned: Vec::new(),
        });
    }

    let problem_json = build_problem(employee_count, capacities);
    let problem_format: Problem = serde_json::from_value(problem_json)
        .context("Failed to deserialize pragmatic problem")?;

    let matrix = build_matrix(costs, matrices);
    let core_problem = (problem_format, vec![matrix])
        .read_pragmatic()
        .context("Failed to build core problem from pragmatic format")?;

    let core_problem = Arc::new(core_problem);
    let solver_config = build_solver_config(core_problem.clone(), config)?;

    let solution = Solver::new(core_problem.clone(), solver_config)
        .solve()
        .context("Failed to solve clustering with vrp-pragmatic")?;

    let pragmatic = write_pragmatic_solution(core_problem.as_ref(), &solution)?;
    Ok(map_solution(capacities.len(), employee_count, &pragmatic))
}

fn build_solver_config(
    problem: Arc<vrp_core::models::Problem>,
    config: &SolverConfig,
) -> Result<vrp_core::rosomaxa::evolution::EvolutionConfig<
    vrp_core::solver::RefinementContext,
    vrp_core::models::GoalContext,
    vrp_core::construction::heuristics::InsertionContext,
>> {
    let config = Config {
        termination: Some(TerminationConfig {
            max_time: Some(config.max_time_seconds as usize),
            max_generations: Some(config.max_generations),
            variation: None,
        }),
        evolution: None,
        hyper: None,
        environment: None,
        telemetry: None,
        output: None,
    };

    let builder = create_builder_from_config(problem, Vec::new(), &config)
        .context("Failed to create solver builder")?;

    builder.build().context("Failed to build solver configuration")
}

fn write_pragmatic_solution(
    problem: &vrp_core::models::Problem,
    solution: &vrp_core::models::Solution,
) -> Result<PragmaticSolution> {
    let mut writer = BufWriter::new(Vec::new());
    write_pragmatic(problem, solution, PragmaticOutputType::default(), &mut writer)
        .context("Failed to serialize pragmatic solution")?;

    let bytes = writer.into_inner().context("Failed to flush solution writer")?;
    let json = String::from_utf8(bytes).context("Solution is not valid UTF-8")?;
    serde_json::from_str(&json).context("Failed to parse pragmatic solution JSON")
}

fn map_solution(
    shuttle_count: usize,
    employee_count: usize,
    solution: &PragmaticSolution,
) -> PragmaticAssignment {
    let shuttle_by_vehicle: HashMap<String, usize> =
        (0..shuttle_count).map(|s| (vehicle_id(s), s)).collect();
    let employee_by_job: HashMap<String, usize> =
        (0..employee_count).map(|e| (job_id(e), e)).collect();

    let mut routes = vec![Vec::new(); shuttle_count];
    for tour in &solution.tours {
        let Some(&shuttle) = shuttle_by_vehicle.get(&tour.vehicle_id) else {
            tracing::warn!("Solution references unknown vehicle {}", tour.vehicle_id);
            continue;
        };
        for stop in &tour.stops {
            for activity in stop.activities() {
                if activity.activity_type == "departure" || activity.activity_type == "arrival" {
                    continue;
                }
                match employee_by_job.get(&activity.job_id) {
                    Some(&employee) => routes[shuttle].push(employee),
                    None => tracing::warn!("Solution references unknown job {}", activity.job_id),
                }
            }
        }
    }

    let unassigned = solution
        .unassigned
        .iter()
        .flatten()
        .filter_map(|job| {
            let reasons: Vec<&str> = job.reasons.iter().map(|r| r.code.as_str()).collect();
            tracing::debug!("Unassigned {}: {}", job.job_id, reasons.join(", "));
            employee_by_job.get(&job.job_id).copied()
        })
        .collect();

    PragmaticAssignment { routes, unassigned }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_matrices(positions_m: &[u64]) -> (Vec<Vec<i64>>, DistanceTimeMatrices) {
        let mut all = vec![0u64];
        all.extend_from_slice(positions_m);
        let distances: Vec<Vec<u64>> = all
            .iter()
            .map(|a| all.iter().map(|b| a.abs_diff(*b)).collect())
            .collect();
        let durations = distances
            .iter()
            .map(|row| row.iter().map(|d| d / 10).collect())
            .collect();
        let costs = distances
            .iter()
            .map(|row| row.iter().map(|d| *d as i64).collect())
            .collect();
        let size = all.len();
        (costs, DistanceTimeMatrices { distances, durations, size })
    }

    #[test]
    fn build_problem_has_one_vehicle_type_per_shuttle() {
        let json = build_problem(3, &[4, 12]);

        let jobs = json["plan"]["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[2]["id"], "employee_2");
        assert_eq!(jobs[2]["deliveries"][0]["places"][0]["location"]["index"], 3);
        assert_eq!(jobs[0]["deliveries"][0]["demand"][0], 1);

        let vehicles = json["fleet"]["vehicles"].as_array().unwrap();
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[1]["vehicleIds"][0], "shuttle_1");
        assert_eq!(vehicles[1]["capacity"][0], 12);
        assert_eq!(vehicles[0]["shifts"][0]["start"]["location"]["index"], 0);
    }

    #[test]
    fn build_problem_is_valid_for_deserialize() {
        let json = build_problem(2, &[3]);
        let problem: Result<Problem, _> = serde_json::from_value(json);
        assert!(problem.is_ok());
    }

    #[test]
    fn build_matrix_uses_costs_as_distances() {
        let (mut costs, matrices) = line_matrices(&[1000, 3000]);
        costs[0][1] = 7777;
        let matrix = build_matrix(&costs, &matrices);

        assert_eq!(matrix.distances.len(), 9);
        assert_eq!(matrix.distances[1], 7777);
        assert_eq!(matrix.travel_times[1], 100);
        assert_eq!(matrix.profile.as_deref(), Some(PROFILE));
    }

    #[test]
    fn solve_pragmatic_respects_capacity() {
        let (costs, matrices) = line_matrices(&[1000, 2000, 3000, 4000, 5000]);
        let capacities = [2, 3];

        let assignment =
            solve_pragmatic(&capacities, &costs, &matrices, &SolverConfig::instant()).unwrap();

        assert!(assignment.unassigned.is_empty());
        assert!(assignment.routes[0].len() <= 2);
        assert!(assignment.routes[1].len() <= 3);
        let mut all: Vec<usize> = assignment.routes.concat();
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn solve_pragmatic_leaves_overflow_unassigned() {
        let (costs, matrices) = line_matrices(&[1000, 2000, 3000]);

        let assignment =
            solve_pragmatic(&[2], &costs, &matrices, &SolverConfig::instant()).unwrap();

        assert_eq!(assignment.routes[0].len(), 2);
        assert_eq!(assignment.unassigned.len(), 1);
    }
}
