//! Route types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Route entity (one shuttle run for a shift on a date)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub vehicle_id: Uuid,
    pub shift_id: Uuid,
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_distance_km: f64,
    pub total_time_minutes: i32,
    pub status: RouteStatus,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Route status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
pub enum RouteStatus {
    Pending,
    Active,
    InProgress,
    Completed,
    Inactive,
    Cancelled,
}

impl RouteStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteStatus::Pending => "pending",
            RouteStatus::Active => "active",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Inactive => "inactive",
            RouteStatus::Cancelled => "cancelled",
        }
    }
}

/// Stored stop of a route, with the employee riding from it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopRow {
    pub stop_id: Uuid,
    pub sequence: Option<i32>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub estimated_arrival_time: Option<DateTime<Utc>>,
    pub employee_id: Option<Uuid>,
    pub employee_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWithStops {
    #[serde(flatten)]
    pub route: Route,
    pub stops: Vec<RouteStopRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRoutesRequest {
    pub shift_id: Uuid,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteListResponse {
    pub items: Vec<Route>,
    pub total: i64,
}

/// One employee pickup in a committed route, in riding order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStopInput {
    pub employee_id: Uuid,
    pub stop_id: Uuid,
}

/// Request to commit a planned route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub name: String,
    pub vehicle_id: Uuid,
    pub shift_id: Uuid,
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub total_distance_km: f64,
    pub total_time_minutes: i32,
    pub stops: Vec<RouteStopInput>,
    /// Planning session to discard once the route is stored
    pub session_id: Option<Uuid>,
}

// ============================================================================
// Naming and preview
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestNameRequest {
    pub employee_ids: Vec<Uuid>,
    pub location_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestNameResponse {
    pub name: Option<String>,
    pub furthest_employee_id: Option<Uuid>,
    pub furthest_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreviewRequest {
    pub employee_ids: Vec<Uuid>,
    pub location_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
}

/// Stop in optimized visiting order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStop {
    pub order: i32,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub stop_id: Uuid,
    pub coordinates: Coordinates,
    pub area: Option<String>,
    pub distance_from_previous_km: f64,
    pub duration_from_previous_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreviewResponse {
    pub hq: Coordinates,
    pub stops: Vec<PreviewStop>,
    /// Employees dropped for lacking a usable stop
    pub skipped_employee_ids: Vec<Uuid>,
    pub total_distance_km: f64,
    pub total_time_minutes: i32,
    /// [lng, lat] pairs, empty when the backend returns no shape
    pub geometry: Vec<[f64; 2]>,
    pub max_duration_minutes: u32,
    pub within_duration_limit: bool,
    pub suggested_name: Option<String>,
    pub backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_route_request_deserialize() {
        let json = r#"{
            "name": "Bole - 5PM",
            "vehicleId": "123e4567-e89b-12d3-a456-426614174000",
            "shiftId": "123e4567-e89b-12d3-a456-426614174001",
            "locationId": "123e4567-e89b-12d3-a456-426614174002",
            "date": "2026-03-02",
            "totalDistanceKm": 18.4,
            "totalTimeMinutes": 52,
            "stops": [
                {"employeeId": "123e4567-e89b-12d3-a456-426614174003",
                 "stopId": "123e4567-e89b-12d3-a456-426614174004"}
            ]
        }"#;

        let request: CreateRouteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "Bole - 5PM");
        assert_eq!(request.stops.len(), 1);
        assert_eq!(request.total_time_minutes, 52);
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_route_status_as_str_matches_serde() {
        for status in [
            RouteStatus::Pending,
            RouteStatus::Active,
            RouteStatus::InProgress,
            RouteStatus::Completed,
            RouteStatus::Inactive,
            RouteStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
