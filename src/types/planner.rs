//! Planning session wire types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Coordinates;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectShuttleRequest {
    pub session_id: Uuid,
    pub shuttle_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleEmployeeRequest {
    pub session_id: Uuid,
    pub employee_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuttleView {
    pub id: Uuid,
    pub name: String,
    pub plate_number: String,
    pub capacity: u32,
    pub recommended: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    pub id: Uuid,
    pub name: String,
    pub department_name: Option<String>,
    pub area: Option<String>,
    pub stop_id: Option<Uuid>,
    pub has_stop: bool,
    pub recommended_shuttle_id: Option<Uuid>,
    pub in_selected_cluster: bool,
    pub selected: bool,
}

/// Everything the planner screen renders for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningSnapshot {
    pub session_id: Uuid,
    pub shift_id: Uuid,
    pub location_id: Uuid,
    pub date: Option<NaiveDate>,
    pub hq: Coordinates,
    /// Sorted by recommended cluster size, largest first
    pub shuttles: Vec<ShuttleView>,
    pub employees: Vec<EmployeeView>,
    pub selected_shuttle_id: Option<Uuid>,
    pub selected_employee_ids: Vec<Uuid>,
    pub seats_used: u32,
    pub seats_total: u32,
    pub total_capacity: u32,
    pub capacity_exceeded: bool,
    /// Employees left out because whole departments did not fit
    pub deferred_employee_ids: Vec<Uuid>,
    pub verification_passed: bool,
    pub algorithm: String,
    pub updated_at: DateTime<Utc>,
}
