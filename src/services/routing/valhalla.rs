//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/
//! https://valhalla.github.io/valhalla/api/optimized/api-reference/

use async_trait::async_trait;
use anyhow::{Result, Context};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Coordinates;
use super::{DistanceTimeMatrices, OptimizedTrip, RouteGeometry, RoutingService, TripLeg};

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn to_locations(locations: &[Coordinates]) -> Vec<ValhallaLocation> {
        locations
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // Home stops are often set on a map pin rather than the road edge
                radius: Some(300),
            })
            .collect()
    }

    /// Build the sources_to_targets request
    fn build_matrix_request(&self, locations: &[Coordinates]) -> MatrixRequest {
        let locs = Self::to_locations(locations);
        MatrixRequest {
            sources: locs.clone(),
            targets: locs,
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }

    /// Build the optimized_route request for origin -> stops -> origin
    fn build_round_trip_request(&self, origin: Coordinates, stops: &[Coordinates]) -> OptimizedRouteRequest {
        let mut waypoints = Vec::with_capacity(stops.len() + 2);
        waypoints.push(origin);
        waypoints.extend_from_slice(stops);
        waypoints.push(origin);

        OptimizedRouteRequest {
            locations: Self::to_locations(&waypoints),
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
            directions_type: "none".to_string(), // We only need geometry and summaries
        }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/{}", self.config.base_url, endpoint);

        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to Valhalla", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla {} returned error {}: {}", endpoint, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Valhalla {} response", endpoint))
    }
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices> {
        let n = locations.len();

        if n == 0 {
            return Ok(DistanceTimeMatrices::empty());
        }

        if n == 1 {
            return Ok(DistanceTimeMatrices {
                distances: vec![vec![0]],
                durations: vec![vec![0]],
                size: 1,
            });
        }

        debug!("Requesting distance matrix from Valhalla for {} locations", n);

        let request = self.build_matrix_request(locations);
        let matrix_response: MatrixResponse = self.post("sources_to_targets", &request).await?;

        let mut distances = vec![vec![0u64; n]; n];
        let mut durations = vec![vec![0u64; n]; n];

        for (i, row) in matrix_response.sources_to_targets.iter().enumerate().take(n) {
            for (j, cell) in row.iter().enumerate().take(n) {
                // Convert km to meters
                distances[i][j] = cell.distance
                    .map(|d| (d * 1000.0) as u64)
                    .unwrap_or_else(|| {
                        warn!("No distance for route {} -> {}", i, j);
                        u64::MAX / 2  // Very large but won't overflow
                    });

                // Time is already in seconds
                durations[i][j] = cell.time
                    .map(|t| t as u64)
                    .unwrap_or_else(|| {
                        warn!("No duration for route {} -> {}", i, j);
                        u64::MAX / 2
                    });
            }
        }

        debug!("Received distance matrix from Valhalla: {}x{}", n, n);

        Ok(DistanceTimeMatrices {
            distances,
            durations,
            size: n,
        })
    }

    async fn optimize_round_trip(
        &self,
        origin: Coordinates,
        stops: &[Coordinates],
    ) -> Result<OptimizedTrip> {
        if stops.is_empty() {
            return Ok(OptimizedTrip {
                order: Vec::new(),
                legs: Vec::new(),
                geometry: RouteGeometry::empty(),
            });
        }

        debug!("Requesting optimized round trip from Valhalla for {} stops", stops.len());

        let request = self.build_round_trip_request(origin, stops);
        let response: OptimizedRouteResponse = self.post("optimized_route", &request).await?;

        trip_from_response(response.trip, stops.len())
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

/// Map an optimized_route trip back onto the caller's stop indices.
fn trip_from_response(trip: Trip, stop_count: usize) -> Result<OptimizedTrip> {
    if trip.locations.len() != stop_count + 2 {
        anyhow::bail!(
            "Valhalla returned {} locations for {} stops",
            trip.locations.len(),
            stop_count
        );
    }

    // First and last location are the fixed origin; original_index counts it.
    let mut order = Vec::with_capacity(stop_count);
    for location in &trip.locations[1..=stop_count] {
        let original = location
            .original_index
            .context("Valhalla location missing original_index")?;
        if original == 0 || original > stop_count {
            anyhow::bail!("Valhalla returned unexpected original_index {}", original);
        }
        order.push(original - 1);
    }

    let mut all_coordinates: Vec<[f64; 2]> = Vec::new();
    let mut legs = Vec::with_capacity(trip.legs.len());
    for (i, leg) in trip.legs.iter().enumerate() {
        legs.push(TripLeg {
            distance_km: leg.summary.length,
            duration_seconds: leg.summary.time,
        });

        let leg_coords = decode_polyline(&leg.shape, 6)?;
        // Skip the first point of subsequent legs (it's the same as last point of previous leg)
        if i == 0 {
            all_coordinates.extend(leg_coords);
        } else {
            all_coordinates.extend(leg_coords.into_iter().skip(1));
        }
    }

    debug!(
        "Received optimized trip with {} legs and {} shape points",
        legs.len(),
        all_coordinates.len()
    );

    Ok(OptimizedTrip {
        order,
        legs,
        geometry: RouteGeometry { coordinates: all_coordinates },
    })
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Distance in kilometers (when units="kilometers")
    distance: Option<f64>,
    /// Time in seconds
    time: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OptimizedRouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct OptimizedRouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    locations: Vec<TripLocation>,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct TripLocation {
    #[serde(default)]
    original_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    /// Encoded polyline shape
    shape: String,
    summary: LegSummary,
}

#[derive(Debug, Deserialize)]
struct LegSummary {
    /// Kilometers (units="kilometers")
    length: f64,
    /// Seconds
    time: f64,
}

/// Decode Valhalla's encoded polyline format
/// Precision is 6 decimal places for Valhalla (vs 5 for Google)
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>> {
    let factor = 10_f64.powi(precision as i32);
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;

    let bytes = encoded.as_bytes();
    let mut i = 0;

    let next_value = |i: &mut usize| -> Result<i64> {
        let mut shift = 0;
        let mut result = 0i64;
        loop {
            if *i >= bytes.len() {
                anyhow::bail!("Invalid polyline encoding");
            }
            let byte = bytes[*i] as i64 - 63;
            *i += 1;
            result |= (byte & 0x1f) << shift;
            shift += 5;
            if byte < 0x20 {
                break;
            }
        }
        Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
    };

    while i < bytes.len() {
        lat += next_value(&mut i)?;
        lng += next_value(&mut i)?;

        // GeoJSON uses [lng, lat] order
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hq() -> Coordinates {
        Coordinates { lat: 9.016465390275195, lng: 38.76856893855111 }
    }

    fn bole() -> Coordinates {
        Coordinates { lat: 8.9779, lng: 38.7993 }
    }

    #[test]
    fn test_valhalla_config_default() {
        let config = ValhallaConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_valhalla_config_strips_trailing_slash() {
        let config = ValhallaConfig::new("http://valhalla:8002/");
        assert_eq!(config.base_url, "http://valhalla:8002");
    }

    #[test]
    fn test_build_matrix_request() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        let request = client.build_matrix_request(&[hq(), bole()]);

        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.targets.len(), 2);
        assert_eq!(request.costing, "auto");
        assert_eq!(request.units, "kilometers");
        assert!((request.sources[1].lat - 8.9779).abs() < 0.0001);
        assert!((request.sources[1].lon - 38.7993).abs() < 0.0001);
    }

    #[test]
    fn test_build_round_trip_request_closes_loop() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        let request = client.build_round_trip_request(hq(), &[bole()]);

        assert_eq!(request.locations.len(), 3);
        assert_eq!(request.directions_type, "none");
        assert!((request.locations[0].lat - request.locations[2].lat).abs() < 1e-12);
    }

    #[test]
    fn test_valhalla_client_name() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        assert_eq!(client.name(), "Valhalla");
    }

    #[test]
    fn test_decode_polyline_reference_example() {
        // (38.5, -120.2), (40.7, -120.95), (43.252, -126.453) at precision 5
        let encoded = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";
        let coords = decode_polyline(encoded, 5).unwrap();
        assert_eq!(coords.len(), 3);
        assert!((coords[0][0] - -120.2).abs() < 1e-6);
        assert!((coords[0][1] - 38.5).abs() < 1e-6);
        assert!((coords[2][0] - -126.453).abs() < 1e-6);
        assert!((coords[2][1] - 43.252).abs() < 1e-6);
    }

    #[test]
    fn test_decode_polyline_truncated_fails() {
        assert!(decode_polyline("_p~iF~ps", 6).is_err());
    }

    #[test]
    fn test_trip_from_response_maps_original_indices() {
        let json = serde_json::json!({
            "locations": [
                {"original_index": 0},
                {"original_index": 2},
                {"original_index": 1},
                {"original_index": 3}
            ],
            "legs": [
                {"shape": "", "summary": {"length": 1.5, "time": 120.0}},
                {"shape": "", "summary": {"length": 2.0, "time": 180.0}},
                {"shape": "", "summary": {"length": 3.0, "time": 240.0}}
            ]
        });
        let trip: Trip = serde_json::from_value(json).unwrap();
        let result = trip_from_response(trip, 2).unwrap();

        assert_eq!(result.order, vec![1, 0]);
        assert_eq!(result.legs.len(), 3);
        assert!((result.total_distance_km() - 6.5).abs() < 1e-9);
        assert!((result.total_duration_seconds() - 540.0).abs() < 1e-9);
    }

    #[test]
    fn test_trip_from_response_rejects_wrong_length() {
        let json = serde_json::json!({
            "locations": [{"original_index": 0}, {"original_index": 1}],
            "legs": []
        });
        let trip: Trip = serde_json::from_value(json).unwrap();
        assert!(trip_from_response(trip, 2).is_err());
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_valhalla_round_trip_addis() {
        let client = ValhallaClient::new(ValhallaConfig::new("http://localhost:8002")).unwrap();
        let stops = vec![bole(), Coordinates { lat: 9.0349, lng: 38.7527 }];

        let trip = client.optimize_round_trip(hq(), &stops).await.unwrap();

        assert_eq!(trip.order.len(), 2);
        assert_eq!(trip.legs.len(), 3);
        assert!(trip.total_distance_km() > 5.0);
        assert!(trip.geometry.coordinates.len() > 10);
    }
}
