//! Capacitated employee clustering
//!
//! Assigns employees to shuttles so that no shuttle exceeds its seats,
//! minimizing a combined distance/bearing cost from HQ. Uses vrp-pragmatic
//! and falls back to a bearing sweep when the solver fails or leaves
//! employees unassigned.

mod admission;
mod config;
mod cost;
mod pragmatic;
mod shift;
mod sweep;

pub use admission::admit_by_department;
pub use config::SolverConfig;
pub use cost::{arc_cost, combined_cost_matrix};
pub use shift::shift_problem;

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::cancellation::RunGuard;
use crate::services::geo::bearing;
use crate::services::routing::{DistanceTimeMatrices, MockRoutingService, RoutingService};
use crate::types::{ClusterRequest, ClusterResponse, ClusterRoute, Coordinates};

/// Employee pickup point
#[derive(Debug, Clone)]
pub struct ClusterPoint {
    pub id: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone)]
pub struct ShuttleSeats {
    pub id: String,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct ClusterProblem {
    pub hq: Coordinates,
    pub employees: Vec<ClusterPoint>,
    pub shuttles: Vec<ShuttleSeats>,
}

impl ClusterProblem {
    /// Validate a stateless clustering request.
    pub fn from_request(request: &ClusterRequest) -> Result<Self, ClusterError> {
        let [lat, lng] = request.locations.hq;
        let hq = Coordinates::new(lat, lng);
        if !hq.is_valid() {
            return Err(ClusterError::InvalidInput(format!("Invalid HQ coordinates: {}, {}", lat, lng)));
        }

        let mut employees = Vec::with_capacity(request.locations.employees.len());
        for employee in &request.locations.employees {
            let coordinates = Coordinates::new(employee.latitude, employee.longitude);
            if !coordinates.is_valid() {
                return Err(ClusterError::InvalidInput(format!(
                    "Invalid coordinates for employee {}",
                    employee.id
                )));
            }
            employees.push(ClusterPoint {
                id: employee.id.clone(),
                coordinates,
            });
        }

        let shuttles = request
            .shuttles
            .iter()
            .map(|s| ShuttleSeats {
                id: s.id.clone(),
                capacity: s.capacity,
            })
            .collect();

        Ok(Self { hq, employees, shuttles })
    }

    pub fn total_demand(&self) -> u32 {
        self.employees.len() as u32
    }

    pub fn total_capacity(&self) -> u32 {
        self.shuttles.iter().map(|s| s.capacity).sum()
    }

    /// HQ followed by every employee
    fn points(&self) -> Vec<Coordinates> {
        std::iter::once(self.hq)
            .chain(self.employees.iter().map(|e| e.coordinates))
            .collect()
    }
}

/// Clustering outcome: one route per shuttle, in input order
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub routes: Vec<ClusterRoute>,
    pub verification_passed: bool,
    pub algorithm: &'static str,
    pub solve_time_ms: u64,
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("At least one shuttle is required for clustering")]
    NoShuttles,
    #[error("{0}")]
    InvalidInput(String),
    #[error("No solution found: {demand} employees for {capacity} seats")]
    NoSolution { demand: u32, capacity: u32 },
    #[error("Clustering was superseded by a newer request")]
    Cancelled,
    #[error(transparent)]
    Solver(#[from] anyhow::Error),
}

impl ClusterError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoShuttles => "NO_SHUTTLES",
            Self::InvalidInput(_) => "INVALID_REQUEST",
            Self::NoSolution { .. } => "NO_SOLUTION",
            Self::Cancelled => "CANCELLED",
            Self::Solver(_) => "SOLVER_ERROR",
        }
    }
}

/// Duplicate and missing employee indices across routes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verification {
    pub duplicates: Vec<usize>,
    pub missing: Vec<usize>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.duplicates.is_empty() && self.missing.is_empty()
    }
}

/// Check that each of `employee_count` employees appears exactly once.
pub fn verify_assignments(routes: &[Vec<usize>], employee_count: usize) -> Verification {
    let mut seen = vec![0u32; employee_count];
    let mut verification = Verification::default();

    for &employee in routes.iter().flatten() {
        match seen.get_mut(employee) {
            Some(count) => {
                *count += 1;
                if *count == 2 {
                    verification.duplicates.push(employee);
                }
            }
            None => verification.duplicates.push(employee),
        }
    }
    verification.missing = (0..employee_count).filter(|&e| seen[e] == 0).collect();

    verification
}

/// Blocking solves allowed at once. A superseded solve keeps its slot
/// until the solver's own time limit ends it.
static SOLVE_SLOTS: Lazy<Arc<Semaphore>> = Lazy::new(|| {
    let slots = std::thread::available_parallelism().map_or(1, |n| n.get());
    Arc::new(Semaphore::new(slots.max(1)))
});

/// Synchronous solver; run it off the async runtime.
pub struct ClusterSolver {
    config: SolverConfig,
    cancel: Option<CancellationToken>,
}

impl ClusterSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Stop between solver phases once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |t| t.is_cancelled())
    }

    pub fn solve(
        &self,
        problem: &ClusterProblem,
        matrices: &DistanceTimeMatrices,
    ) -> Result<ClusterPlan, ClusterError> {
        let started_at = Instant::now();

        if problem.shuttles.is_empty() {
            return Err(ClusterError::NoShuttles);
        }

        let demand = problem.total_demand();
        let capacity = problem.total_capacity();
        if demand > capacity {
            return Err(ClusterError::NoSolution { demand, capacity });
        }

        let points = problem.points();
        if matrices.size != points.len() {
            return Err(ClusterError::Solver(anyhow::anyhow!(
                "Matrix size {} does not match {} locations",
                matrices.size,
                points.len()
            )));
        }

        if self.cancelled() {
            return Err(ClusterError::Cancelled);
        }

        let capacities: Vec<u32> = problem.shuttles.iter().map(|s| s.capacity).collect();
        let costs = combined_cost_matrix(&points, matrices);

        info!(
            "Clustering {} employees into {} shuttles ({} seats)",
            demand,
            capacities.len(),
            capacity
        );

        let solved = pragmatic::solve_pragmatic(&capacities, &costs, matrices, &self.config);
        if self.cancelled() {
            debug!("Clustering superseded after vrp-pragmatic, skipping fallback");
            return Err(ClusterError::Cancelled);
        }

        let (routes, algorithm) = match solved {
            Ok(assignment) if assignment.unassigned.is_empty() => {
                (assignment.routes, "vrp-pragmatic")
            }
            Ok(assignment) => {
                warn!(
                    "vrp-pragmatic left {} employees unassigned, falling back to sweep",
                    assignment.unassigned.len()
                );
                (self.sweep(problem, &capacities, &costs), "sweep")
            }
            Err(err) => {
                warn!("vrp-pragmatic failed, falling back to sweep: {}", err);
                (self.sweep(problem, &capacities, &costs), "sweep")
            }
        };

        let verification = verify_assignments(&routes, problem.employees.len());
        if !verification.passed() {
            warn!(
                "Cluster verification failed: duplicates={:?} missing={:?}",
                verification.duplicates, verification.missing
            );
        }

        let routes = routes
            .into_iter()
            .zip(&problem.shuttles)
            .map(|(members, shuttle)| ClusterRoute {
                shuttle_id: shuttle.id.clone(),
                employees: members
                    .into_iter()
                    .filter_map(|e| problem.employees.get(e).map(|p| p.id.clone()))
                    .collect(),
            })
            .collect();

        let solve_time_ms = started_at.elapsed().as_millis() as u64;
        debug!("Clustering finished with {} in {} ms", algorithm, solve_time_ms);

        Ok(ClusterPlan {
            routes,
            verification_passed: verification.passed(),
            algorithm,
            solve_time_ms,
        })
    }

    fn sweep(&self, problem: &ClusterProblem, capacities: &[u32], costs: &[Vec<i64>]) -> Vec<Vec<usize>> {
        let bearings: Vec<f64> = problem
            .employees
            .iter()
            .map(|e| bearing(&problem.hq, &e.coordinates))
            .collect();
        let result = sweep::sweep(&bearings, capacities, costs);
        if !result.unassigned.is_empty() {
            warn!("Sweep could not seat {} employees", result.unassigned.len());
        }
        result.routes
    }
}

/// Fetch matrices and solve, giving up early if a newer run supersedes
/// this one. The blocking solve itself only stops at its next phase
/// boundary or time limit.
pub async fn run_clustering(
    routing: &dyn RoutingService,
    problem: ClusterProblem,
    config: SolverConfig,
    guard: &RunGuard,
) -> Result<ClusterPlan, ClusterError> {
    let points = problem.points();
    let matrices = match routing.get_matrices(&points).await {
        Ok(m) => m,
        Err(e) => {
            warn!("{} matrix failed, using estimates: {}", routing.name(), e);
            MockRoutingService::new().get_matrices(&points).await?
        }
    };

    if guard.is_superseded() {
        return Err(ClusterError::Cancelled);
    }

    let token = guard.token();
    let permit = tokio::select! {
        _ = token.cancelled() => return Err(ClusterError::Cancelled),
        permit = Arc::clone(&SOLVE_SLOTS).acquire_owned() => permit
            .map_err(|e| ClusterError::Solver(anyhow::anyhow!("Solver slots closed: {}", e)))?,
    };

    let solver = ClusterSolver::new(config).with_cancellation(token.clone());
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        solver.solve(&problem, &matrices)
    });

    tokio::select! {
        _ = token.cancelled() => Err(ClusterError::Cancelled),
        joined = handle => joined
            .map_err(|e| ClusterError::Solver(anyhow::anyhow!("Clustering task failed: {}", e)))?,
    }
}

/// Stateless clustering with the empty-input replies of the public API.
pub async fn cluster_request(
    routing: &dyn RoutingService,
    request: &ClusterRequest,
    config: SolverConfig,
    guard: &RunGuard,
) -> Result<ClusterResponse, ClusterError> {
    let problem = ClusterProblem::from_request(request)?;

    if problem.shuttles.is_empty() {
        return Ok(ClusterResponse::no_shuttles());
    }
    if problem.employees.is_empty() {
        return Ok(ClusterResponse::no_employees(problem.total_capacity()));
    }

    let total_demand = problem.total_demand();
    let total_capacity = problem.total_capacity();
    let plan = run_clustering(routing, problem, config, guard).await?;

    Ok(ClusterResponse {
        success: true,
        message: None,
        routes: plan.routes,
        verification_passed: plan.verification_passed,
        total_demand,
        total_capacity,
        algorithm: Some(plan.algorithm.to_string()),
    })
}
