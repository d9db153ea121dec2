//! Clustering request/response types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Employee pickup point for stateless clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEmployee {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterShuttle {
    pub id: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterLocations {
    /// [latitude, longitude]
    #[serde(rename = "HQ")]
    pub hq: [f64; 2],
    #[serde(default)]
    pub employees: Vec<ClusterEmployee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub locations: ClusterLocations,
    #[serde(default)]
    pub shuttles: Vec<ClusterShuttle>,
}

/// Employees recommended for one shuttle, in pickup order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoute {
    pub shuttle_id: String,
    pub employees: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub routes: Vec<ClusterRoute>,
    pub verification_passed: bool,
    pub total_demand: u32,
    pub total_capacity: u32,
    /// "pragmatic" or "sweep"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl ClusterResponse {
    pub fn no_shuttles() -> Self {
        Self {
            success: false,
            message: Some("At least one shuttle is required for clustering".to_string()),
            routes: Vec::new(),
            verification_passed: false,
            total_demand: 0,
            total_capacity: 0,
            algorithm: None,
        }
    }

    pub fn no_employees(total_capacity: u32) -> Self {
        Self {
            success: true,
            message: Some("No employees to assign".to_string()),
            routes: Vec::new(),
            verification_passed: true,
            total_demand: 0,
            total_capacity,
            algorithm: None,
        }
    }
}

/// Cluster the unassigned employees of a shift at a location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftClusterRequest {
    pub shift_id: Uuid,
    pub location_id: Uuid,
    pub date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_request_parses_hq_array() {
        let json = r#"{
            "locations": {
                "HQ": [9.0164, 38.7685],
                "employees": [{"id": "e1", "latitude": 9.02, "longitude": 38.75}]
            },
            "shuttles": [{"id": "s1", "capacity": 12}]
        }"#;
        let request: ClusterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.locations.hq, [9.0164, 38.7685]);
        assert_eq!(request.locations.employees.len(), 1);
        assert_eq!(request.shuttles[0].capacity, 12);
    }

    #[test]
    fn test_cluster_request_missing_lists_default_empty() {
        let json = r#"{"locations": {"HQ": [9.0, 38.7]}}"#;
        let request: ClusterRequest = serde_json::from_str(json).unwrap();
        assert!(request.locations.employees.is_empty());
        assert!(request.shuttles.is_empty());
    }

    #[test]
    fn test_no_shuttles_response() {
        let json = serde_json::to_value(ClusterResponse::no_shuttles()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "At least one shuttle is required for clustering");
        assert_eq!(json["routes"].as_array().unwrap().len(), 0);
    }
}
