use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::Shift;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "vehicle_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
    OutOfService,
    Inactive,
}

/// Shuttle with its category capacity joined in
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub plate_number: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub capacity: i32,
    pub category_capacity: Option<i32>,
    pub daily_rate: Option<f64>,
    pub status: VehicleStatus,
    pub is_active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// Seats available to passengers: own capacity, else the category's.
    pub fn seat_capacity(&self) -> u32 {
        if self.capacity > 0 {
            self.capacity as u32
        } else {
            self.category_capacity.filter(|c| *c > 0).unwrap_or(0) as u32
        }
    }

    /// First static reason this vehicle cannot take a route, if any.
    pub fn static_unavailability(&self) -> Option<UnavailableReason> {
        if self.deleted {
            return Some(UnavailableReason::Deleted);
        }
        if !self.is_active {
            return Some(UnavailableReason::NotActive);
        }
        match self.status {
            VehicleStatus::Maintenance => Some(UnavailableReason::Maintenance),
            VehicleStatus::OutOfService => Some(UnavailableReason::OutOfService),
            VehicleStatus::Inactive => Some(UnavailableReason::StatusInactive),
            VehicleStatus::Available | VehicleStatus::InUse => None,
        }
    }
}

/// Why a vehicle cannot serve a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    ShiftNotFound,
    VehicleNotFound,
    Deleted,
    NotActive,
    Maintenance,
    OutOfService,
    StatusInactive,
    ConflictingRoute,
    MarkedUnavailable,
}

impl UnavailableReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::ShiftNotFound => "Shift not found",
            Self::VehicleNotFound => "Vehicle not found",
            Self::Deleted => "Vehicle has been deleted",
            Self::NotActive => "Vehicle is not active",
            Self::Maintenance => "Vehicle is under maintenance",
            Self::OutOfService => "Vehicle is out of service",
            Self::StatusInactive => "Vehicle status is inactive",
            Self::ConflictingRoute => "Vehicle has conflicting routes",
            Self::MarkedUnavailable => "Vehicle is marked as unavailable",
        }
    }
}

/// Request for shuttles free for a shift
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableShuttlesRequest {
    pub shift_id: Uuid,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableShuttlesResponse {
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
    pub shift: Shift,
}

/// Request to check one vehicle against a route window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckVehicleRequest {
    pub vehicle_id: Uuid,
    pub shift_id: Uuid,
    pub date: NaiveDate,
    /// Defaults to the shift's departure on `date`
    pub start_time: Option<NaiveDateTime>,
    /// Defaults to start plus the maximum route duration
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleAvailability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VehicleAvailability {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
            message: None,
        }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self {
            available: false,
            reason: Some(reason),
            message: Some(reason.message().to_string()),
        }
    }
}
