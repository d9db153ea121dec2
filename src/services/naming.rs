//! Route name suggestions
//!
//! A route is named after the area of its stop furthest from HQ, followed by
//! the hour the shift ends, e.g. "Bole - 5PM".

use std::collections::HashMap;

use chrono::NaiveTime;
use uuid::Uuid;

use crate::services::geo::furthest_from;
use crate::types::{hour_label, Coordinates, PlanningEmployee};

#[derive(Debug, Clone, PartialEq)]
pub struct NameSuggestion {
    pub name: String,
    pub furthest_employee_id: Uuid,
    pub furthest_distance_km: f64,
}

/// Suggest a name for a route over `employees`. Employees without a usable
/// stop are ignored; `None` when none remain.
pub fn suggest_route_name(
    hq: &Coordinates,
    employees: &[PlanningEmployee],
    shift_end: Option<NaiveTime>,
) -> Option<NameSuggestion> {
    let with_stops: Vec<(&PlanningEmployee, Coordinates)> = employees
        .iter()
        .filter_map(|e| e.stop_coordinates().map(|c| (e, c)))
        .collect();

    let points: Vec<Coordinates> = with_stops.iter().map(|(_, c)| *c).collect();
    let (index, distance_km) = furthest_from(hq, &points)?;
    let (employee, _) = with_stops[index];

    // An employee with neither area nor address still names the route
    let area = employee.area_label().unwrap_or_else(|| employee.name.clone());
    let name = match shift_end {
        Some(end) => format!("{} - {}", area, hour_label(end)),
        None => area,
    };

    Some(NameSuggestion {
        name,
        furthest_employee_id: employee.id,
        furthest_distance_km: distance_km,
    })
}

/// Reorder loaded employees to the order the planner picked them in, so
/// distance ties resolve the same way as in the route preview. Employees
/// not named in `requested` go last.
pub fn in_request_order(mut employees: Vec<PlanningEmployee>, requested: &[Uuid]) -> Vec<PlanningEmployee> {
    let position: HashMap<Uuid, usize> = requested
        .iter()
        .enumerate()
        .rev()
        .map(|(i, id)| (*id, i))
        .collect();
    employees.sort_by_key(|e| position.get(&e.id).copied().unwrap_or(usize::MAX));
    employees
}
