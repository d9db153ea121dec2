//! Route commit rules

use std::collections::HashSet;

use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::defaults::MAX_ROUTE_NAME_LEN;
use crate::types::{CreateRouteRequest, VehicleAvailability};

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("{0}")]
    Validation(String),
    #[error("Route takes {minutes} minutes, the limit is {max}")]
    DurationExceeded { minutes: i32, max: u32 },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Vehicle is not available: {}", .0.message.as_deref().unwrap_or("unknown reason"))]
    VehicleUnavailable(VehicleAvailability),
    #[error("{stops} stops exceed the vehicle's {capacity} seats")]
    CapacityExceeded { stops: usize, capacity: u32 },
    #[error("Employees are already assigned or unknown")]
    EmployeesUnavailable(Vec<Uuid>),
    #[error("Stops are not the employees' stops or are already routed")]
    StopsInvalid(Vec<Uuid>),
    #[error("Route is already deleted")]
    AlreadyDeleted,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl CommitError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DurationExceeded { .. } => "DURATION_EXCEEDED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::VehicleUnavailable(_) => "VEHICLE_UNAVAILABLE",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::EmployeesUnavailable(_) => "EMPLOYEES_UNAVAILABLE",
            Self::StopsInvalid(_) => "STOPS_INVALID",
            Self::AlreadyDeleted => "ALREADY_DELETED",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Structured details for the error reply, when there are any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::VehicleUnavailable(availability) => Some(json!({ "reason": availability.reason })),
            Self::EmployeesUnavailable(ids) => Some(json!({ "employeeIds": ids })),
            Self::StopsInvalid(ids) => Some(json!({ "stopIds": ids })),
            Self::DurationExceeded { minutes, max } => {
                Some(json!({ "totalTimeMinutes": minutes, "maxDurationMinutes": max }))
            }
            Self::CapacityExceeded { stops, capacity } => {
                Some(json!({ "stops": stops, "capacity": capacity }))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CommitError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

/// Checks that need no database. Returns the trimmed route name.
pub fn validate_create_request(
    request: &CreateRouteRequest,
    max_duration_minutes: u32,
) -> Result<String, CommitError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(CommitError::Validation("Route name is required".into()));
    }
    if name.chars().count() > MAX_ROUTE_NAME_LEN {
        return Err(CommitError::Validation(format!(
            "Route name must be at most {} characters",
            MAX_ROUTE_NAME_LEN
        )));
    }
    if request.stops.is_empty() {
        return Err(CommitError::Validation("A route needs at least one stop".into()));
    }
    if !request.total_distance_km.is_finite() || request.total_distance_km < 0.0 {
        return Err(CommitError::Validation("Total distance must be a non-negative number".into()));
    }
    if request.total_time_minutes < 0 {
        return Err(CommitError::Validation("Total time must not be negative".into()));
    }

    let mut employees = HashSet::new();
    let mut stops = HashSet::new();
    for stop in &request.stops {
        if !employees.insert(stop.employee_id) {
            return Err(CommitError::Validation(format!(
                "Employee {} appears more than once",
                stop.employee_id
            )));
        }
        if !stops.insert(stop.stop_id) {
            return Err(CommitError::Validation(format!(
                "Stop {} appears more than once",
                stop.stop_id
            )));
        }
    }

    if request.total_time_minutes > max_duration_minutes as i32 {
        return Err(CommitError::DurationExceeded {
            minutes: request.total_time_minutes,
            max: max_duration_minutes,
        });
    }

    Ok(name.to_string())
}
