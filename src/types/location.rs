//! Location and coordinate types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Usable as a stop: valid, with neither component left at the 0
    /// placeholder of failed geocoding.
    pub fn is_usable(&self) -> bool {
        self.is_valid() && self.lat != 0.0 && self.lng != 0.0
    }

    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "location_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Hq,
    Branch,
}

/// Work location (HQ or branch) that routes start from and return to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub kind: LocationKind,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude).filter(|c| c.is_usable())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationListResponse {
    pub items: Vec<Location>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_coordinates_are_not_usable() {
        assert!(Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, 0.0).is_usable());
        assert!(Coordinates::new(9.03, 38.74).is_usable());
    }

    #[test]
    fn test_single_zero_component_is_not_usable() {
        assert!(!Coordinates::new(9.03, 0.0).is_usable());
        assert!(!Coordinates::new(0.0, 38.74).is_usable());
        assert!(!Coordinates::new(-0.0, 38.74).is_usable());
    }

    #[test]
    fn test_out_of_range_coordinates_are_invalid() {
        assert!(!Coordinates::new(91.0, 38.0).is_valid());
        assert!(!Coordinates::new(9.0, 181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 38.0).is_valid());
    }

    #[test]
    fn test_location_without_coordinates() {
        let location = Location {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            name: "Bole Branch".into(),
            address: None,
            latitude: Some(8.99),
            longitude: None,
            kind: LocationKind::Branch,
            created_at: Utc::now(),
        };
        assert!(location.coordinates().is_none());
    }

    #[test]
    fn test_location_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LocationKind::Hq).unwrap(), "\"hq\"");
    }
}
