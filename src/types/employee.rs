use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Employee as seen by the planner: identity, department and pickup stop
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlanningEmployee {
    pub id: Uuid,
    pub name: String,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    /// Neighbourhood the employee lives in
    pub area: Option<String>,
    pub stop_id: Option<Uuid>,
    pub stop_latitude: Option<f64>,
    pub stop_longitude: Option<f64>,
    pub stop_address: Option<String>,
}

impl PlanningEmployee {
    /// Stop coordinates when the employee has a usable stop.
    pub fn stop_coordinates(&self) -> Option<Coordinates> {
        self.stop_id?;
        Coordinates::from_parts(self.stop_latitude, self.stop_longitude)
            .filter(|c| c.is_usable())
    }

    pub fn has_stop(&self) -> bool {
        self.stop_coordinates().is_some()
    }

    /// Area used in route names: the employee's area, else the first two
    /// words of the stop address.
    pub fn area_label(&self) -> Option<String> {
        if let Some(area) = self.area.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            return Some(area.to_string());
        }
        let address = self.stop_address.as_deref()?.trim();
        let words: Vec<&str> = address
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|w| !w.is_empty())
            .take(2)
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedEmployeesRequest {
    pub shift_id: Uuid,
    pub location_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub items: Vec<PlanningEmployee>,
    pub total: i64,
}

#[cfg(test)]
pub(crate) fn test_employee(name: &str, lat: f64, lng: f64) -> PlanningEmployee {
    PlanningEmployee {
        id: Uuid::new_v4(),
        name: name.to_string(),
        department_id: None,
        department_name: None,
        area: None,
        stop_id: Some(Uuid::new_v4()),
        stop_latitude: Some(lat),
        stop_longitude: Some(lng),
        stop_address: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_without_stop_id_has_no_stop() {
        let mut e = test_employee("Abebe", 9.0, 38.7);
        assert!(e.has_stop());
        e.stop_id = None;
        assert!(!e.has_stop());
    }

    #[test]
    fn test_zero_stop_is_ignored() {
        let e = test_employee("Abebe", 0.0, 0.0);
        assert!(e.stop_coordinates().is_none());
    }

    #[test]
    fn test_half_geocoded_stop_is_ignored() {
        assert!(test_employee("Half", 9.03, 0.0).stop_coordinates().is_none());
        assert!(test_employee("Half", 0.0, 38.74).stop_coordinates().is_none());
        assert!(!test_employee("Half", 9.03, 0.0).has_stop());
    }

    #[test]
    fn test_area_label_prefers_area() {
        let mut e = test_employee("Abebe", 9.0, 38.7);
        e.area = Some("  Bole ".into());
        e.stop_address = Some("Megenagna Square, Addis Ababa".into());
        assert_eq!(e.area_label().as_deref(), Some("Bole"));
    }

    #[test]
    fn test_area_label_falls_back_to_address_words() {
        let mut e = test_employee("Abebe", 9.0, 38.7);
        e.stop_address = Some("Megenagna Square, Addis Ababa".into());
        assert_eq!(e.area_label().as_deref(), Some("Megenagna Square"));

        e.stop_address = Some("   ".into());
        assert!(e.area_label().is_none());
    }
}
