//! Shift clustering input
//!
//! Turns a shift's location, available vehicles and unassigned employees
//! into a clustering problem and, once solved, into a planning session seed.

use chrono::NaiveDate;
use uuid::Uuid;

use super::{admit_by_department, ClusterError, ClusterPlan, ClusterPoint, ClusterProblem, ShuttleSeats};
use crate::services::planner::{clusters_from_routes, SessionSeed, SessionShuttle};
use crate::types::{Coordinates, Location, PlanningEmployee, Vehicle};

#[derive(Debug, Clone)]
pub struct ShiftProblem {
    pub hq: Coordinates,
    /// Shuttles with at least one seat
    pub shuttles: Vec<SessionShuttle>,
    /// Every unassigned employee, stopless ones included
    pub employees: Vec<PlanningEmployee>,
    pub deferred_employee_ids: Vec<Uuid>,
    pub capacity_exceeded: bool,
    /// Admitted employees with a usable stop
    pub problem: ClusterProblem,
}

/// Build the clustering problem of one shift.
///
/// Zero-seat vehicles are dropped, employees without a usable stop never
/// reach admission and the location falls back to `fallback_hq` when it
/// has no usable coordinates.
pub fn shift_problem(
    location: &Location,
    vehicles: &[Vehicle],
    employees: Vec<PlanningEmployee>,
    fallback_hq: Coordinates,
) -> Result<ShiftProblem, ClusterError> {
    let shuttles: Vec<SessionShuttle> = vehicles
        .iter()
        .map(SessionShuttle::from)
        .filter(|s| s.capacity > 0)
        .collect();
    if shuttles.is_empty() {
        return Err(ClusterError::NoShuttles);
    }

    let with_stops: Vec<PlanningEmployee> = employees.iter().filter(|e| e.has_stop()).cloned().collect();
    let total_capacity: u32 = shuttles.iter().map(|s| s.capacity).sum();
    let admission = admit_by_department(with_stops, total_capacity);

    let hq = location.coordinates().unwrap_or(fallback_hq);
    let problem = ClusterProblem {
        hq,
        employees: admission
            .admitted
            .iter()
            .filter_map(|e| {
                e.stop_coordinates().map(|coordinates| ClusterPoint {
                    id: e.id.to_string(),
                    coordinates,
                })
            })
            .collect(),
        shuttles: shuttles
            .iter()
            .map(|s| ShuttleSeats {
                id: s.id.to_string(),
                capacity: s.capacity,
            })
            .collect(),
    };

    Ok(ShiftProblem {
        hq,
        shuttles,
        employees,
        deferred_employee_ids: admission.deferred.iter().map(|e| e.id).collect(),
        capacity_exceeded: admission.capacity_exceeded,
        problem,
    })
}

impl ShiftProblem {
    /// Nothing to solve: no admitted employee has a stop.
    pub fn is_empty(&self) -> bool {
        self.problem.employees.is_empty()
    }

    /// Session seed from the solved plan; `None` when there was nothing to
    /// solve.
    pub fn into_seed(
        self,
        organization_id: Uuid,
        shift_id: Uuid,
        location_id: Uuid,
        date: Option<NaiveDate>,
        plan: Option<&ClusterPlan>,
    ) -> SessionSeed {
        let (clusters, verification_passed, algorithm) = match plan {
            Some(plan) => (
                clusters_from_routes(&plan.routes),
                plan.verification_passed,
                plan.algorithm.to_string(),
            ),
            None => (Default::default(), true, "none".to_string()),
        };

        SessionSeed {
            organization_id,
            shift_id,
            location_id,
            date,
            hq: self.hq,
            shuttles: self.shuttles,
            employees: self.employees,
            deferred_employee_ids: self.deferred_employee_ids,
            clusters,
            verification_passed,
            algorithm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::employee::test_employee;
    use crate::types::{ClusterRoute, LocationKind, VehicleStatus};
    use chrono::Utc;

    const HQ: Coordinates = Coordinates { lat: 9.016465390275195, lng: 38.76856893855111 };

    fn location(latitude: Option<f64>, longitude: Option<f64>) -> Location {
        Location {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            name: "Bole Office".into(),
            address: None,
            latitude,
            longitude,
            kind: LocationKind::Branch,
            created_at: Utc::now(),
        }
    }

    fn vehicle(name: &str, capacity: i32) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            name: name.into(),
            plate_number: format!("AA-{}", name),
            category_id: None,
            category_name: None,
            capacity,
            category_capacity: None,
            daily_rate: None,
            status: VehicleStatus::Available,
            is_active: true,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn in_department(mut e: PlanningEmployee, department: Uuid, name: &str) -> PlanningEmployee {
        e.department_id = Some(department);
        e.department_name = Some(name.into());
        e
    }

    #[test]
    fn test_zero_seat_vehicles_are_dropped() {
        let vehicles = vec![vehicle("Empty", 0), vehicle("Coaster", 4)];
        let shift = shift_problem(&location(Some(9.0), Some(38.8)), &vehicles, Vec::new(), HQ).unwrap();

        assert_eq!(shift.shuttles.len(), 1);
        assert_eq!(shift.shuttles[0].name, "Coaster");
        assert_eq!(shift.problem.shuttles.len(), 1);
        assert_eq!(shift.problem.shuttles[0].id, vehicles[1].id.to_string());
    }

    #[test]
    fn test_no_seated_vehicle_is_no_shuttles() {
        let err = shift_problem(&location(None, None), &[vehicle("Empty", 0)], Vec::new(), HQ).unwrap_err();
        assert_eq!(err.code(), "NO_SHUTTLES");

        let err = shift_problem(&location(None, None), &[], Vec::new(), HQ).unwrap_err();
        assert_eq!(err.code(), "NO_SHUTTLES");
    }

    #[test]
    fn test_employees_without_usable_stop_stay_out_of_problem() {
        let good = test_employee("Abebe", 9.02, 38.75);
        let mut stopless = test_employee("Bethlehem", 9.03, 38.76);
        stopless.stop_id = None;
        let half = test_employee("Chaltu", 9.04, 0.0);

        let shift = shift_problem(
            &location(Some(9.0), Some(38.8)),
            &[vehicle("Coaster", 4)],
            vec![good.clone(), stopless.clone(), half.clone()],
            HQ,
        )
        .unwrap();

        let ids: Vec<&str> = shift.problem.employees.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![good.id.to_string().as_str()]);
        assert_eq!(shift.employees.len(), 3);
        assert!(shift.deferred_employee_ids.is_empty());
        assert!(!shift.capacity_exceeded);
    }

    #[test]
    fn test_stopless_employees_do_not_count_against_seats() {
        let mut stopless = test_employee("Dawit", 9.03, 38.76);
        stopless.stop_id = None;
        let employees = vec![
            test_employee("Abebe", 9.02, 38.75),
            test_employee("Bethlehem", 9.03, 38.74),
            stopless,
        ];

        let shift = shift_problem(&location(None, None), &[vehicle("Minibus", 2)], employees, HQ).unwrap();
        assert!(!shift.capacity_exceeded);
        assert_eq!(shift.problem.employees.len(), 2);
    }

    #[test]
    fn test_location_without_coordinates_uses_fallback_hq() {
        let shift = shift_problem(&location(None, None), &[vehicle("Coaster", 4)], Vec::new(), HQ).unwrap();
        assert_eq!(shift.hq, HQ);
        assert_eq!(shift.problem.hq, HQ);

        let shift = shift_problem(&location(Some(9.0), Some(0.0)), &[vehicle("Coaster", 4)], Vec::new(), HQ).unwrap();
        assert_eq!(shift.hq, HQ);

        let shift =
            shift_problem(&location(Some(9.05), Some(38.8)), &[vehicle("Coaster", 4)], Vec::new(), HQ).unwrap();
        assert_eq!(shift.hq, Coordinates::new(9.05, 38.8));
    }

    #[test]
    fn test_overflowing_department_is_deferred_but_kept() {
        let finance = Uuid::new_v4();
        let ops = Uuid::new_v4();
        let employees = vec![
            in_department(test_employee("Abebe", 9.02, 38.75), ops, "Operations"),
            in_department(test_employee("Bethlehem", 9.03, 38.74), ops, "Operations"),
            in_department(test_employee("Chaltu", 9.01, 38.73), finance, "Finance"),
            in_department(test_employee("Dawit", 9.04, 38.72), finance, "Finance"),
            in_department(test_employee("Eden", 9.05, 38.71), finance, "Finance"),
        ];
        let finance_ids: Vec<Uuid> = employees[2..].iter().map(|e| e.id).collect();

        let shift = shift_problem(&location(None, None), &[vehicle("Minibus", 2)], employees, HQ).unwrap();

        assert!(shift.capacity_exceeded);
        assert_eq!(shift.deferred_employee_ids, finance_ids);
        assert_eq!(shift.problem.employees.len(), 2);
        assert_eq!(shift.employees.len(), 5);
    }

    #[test]
    fn test_seed_without_plan_is_algorithm_none() {
        let shift = shift_problem(&location(None, None), &[vehicle("Coaster", 4)], Vec::new(), HQ).unwrap();
        assert!(shift.is_empty());

        let seed = shift.into_seed(Uuid::nil(), Uuid::nil(), Uuid::nil(), None, None);
        assert_eq!(seed.algorithm, "none");
        assert!(seed.verification_passed);
        assert!(seed.clusters.is_empty());
        assert_eq!(seed.shuttles.len(), 1);
    }

    #[test]
    fn test_seed_carries_plan_clusters() {
        let vehicles = [vehicle("Coaster", 4)];
        let employee = test_employee("Abebe", 9.02, 38.75);
        let shift = shift_problem(&location(None, None), &vehicles, vec![employee.clone()], HQ).unwrap();
        assert!(!shift.is_empty());

        let plan = ClusterPlan {
            routes: vec![ClusterRoute {
                shuttle_id: vehicles[0].id.to_string(),
                employees: vec![employee.id.to_string()],
            }],
            verification_passed: false,
            algorithm: "sweep",
            solve_time_ms: 3,
        };
        let seed = shift.into_seed(Uuid::nil(), Uuid::nil(), Uuid::nil(), None, Some(&plan));

        assert_eq!(seed.algorithm, "sweep");
        assert!(!seed.verification_passed);
        assert_eq!(seed.clusters[&vehicles[0].id], vec![employee.id]);
    }
}
