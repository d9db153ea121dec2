//! Routing service for distance matrices and round-trip optimization
//!
//! Uses Valhalla for production, a Haversine estimate when Valhalla is
//! not configured or unreachable.

pub mod tour;
mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use async_trait::async_trait;
use anyhow::Result;
use crate::types::Coordinates;

/// Distance and time matrices between locations
#[derive(Debug, Clone)]
pub struct DistanceTimeMatrices {
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<u64>>,
    /// Duration in seconds [i][j] from location i to location j
    pub durations: Vec<Vec<u64>>,
    /// Number of locations
    pub size: usize,
}

impl DistanceTimeMatrices {
    /// Create empty matrices
    pub fn empty() -> Self {
        Self {
            distances: vec![],
            durations: vec![],
            size: 0,
        }
    }

    /// Get distance from location i to location j in meters
    pub fn distance(&self, from: usize, to: usize) -> u64 {
        self.distances[from][to]
    }

    /// Get duration from location i to location j in seconds
    pub fn duration(&self, from: usize, to: usize) -> u64 {
        self.durations[from][to]
    }
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    /// Create empty geometry (for fallback when no route available)
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Create geometry from a list of coordinates (straight lines)
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords
                .iter()
                .map(|c| [c.lng, c.lat])
                .collect(),
        }
    }

    /// Check if geometry is empty
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// One leg between consecutive waypoints of a trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripLeg {
    pub distance_km: f64,
    pub duration_seconds: f64,
}

/// Round trip origin -> stops -> origin in optimized order
#[derive(Debug, Clone)]
pub struct OptimizedTrip {
    /// Visiting order as indices into the input stops
    pub order: Vec<usize>,
    /// `order.len() + 1` legs, the last one returning to the origin
    pub legs: Vec<TripLeg>,
    pub geometry: RouteGeometry,
}

impl OptimizedTrip {
    pub fn total_distance_km(&self) -> f64 {
        self.legs.iter().map(|l| l.distance_km).sum()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.legs.iter().map(|l| l.duration_seconds).sum()
    }
}

/// Routing service trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Get distance and time matrices for a list of locations
    /// First location is typically the depot (starting point)
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices>;

    /// Order `stops` to minimize the round trip from and back to `origin`
    async fn optimize_round_trip(
        &self,
        origin: Coordinates,
        stops: &[Coordinates],
    ) -> Result<OptimizedTrip>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Mock routing service for tests and Valhalla-less deployments
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 30)
    average_speed_kmh: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: crate::services::geo::ROAD_COEFFICIENT,
            average_speed_kmh: crate::services::geo::AVERAGE_SPEED_KMH,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn get_matrices(&self, locations: &[Coordinates]) -> Result<DistanceTimeMatrices> {
        use crate::services::geo::haversine_distance;

        let n = locations.len();
        if n == 0 {
            return Ok(DistanceTimeMatrices::empty());
        }

        let mut distances = vec![vec![0u64; n]; n];
        let mut durations = vec![vec![0u64; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    // Haversine distance in km
                    let straight_line_km = haversine_distance(&locations[i], &locations[j]);
                    // Estimated road distance in meters
                    let road_distance_m = (straight_line_km * self.road_coefficient * 1000.0) as u64;
                    // Travel time in seconds
                    let travel_time_s = ((straight_line_km * self.road_coefficient)
                        / self.average_speed_kmh * 3600.0) as u64;

                    distances[i][j] = road_distance_m;
                    durations[i][j] = travel_time_s;
                }
            }
        }

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
        let mut points = Vec::with_capacity(stops.len() + 1);
        points.push(origin);
        points.extend_from_slice(stops);

        let matrices = self.get_matrices(&points).await?;
        let mut path = tour::nearest_neighbor(&matrices.distances);
        let greedy_m = tour::tour_length(&matrices.distances, &path);
        tour::two_opt(&matrices.distances, &mut path);
        tracing::debug!(
            "Round trip over {} stops: {} m after 2-opt, {} m greedy",
            stops.len(),
            tour::tour_length(&matrices.distances, &path),
            greedy_m
        );

        let mut legs = Vec::with_capacity(path.len() + 1);
        if !path.is_empty() {
            let mut prev = 0;
            for &node in path.iter().chain(std::iter::once(&0)) {
                legs.push(TripLeg {
                    distance_km: matrices.distance(prev, node) as f64 / 1000.0,
                    duration_seconds: matrices.duration(prev, node) as f64,
                });
                prev = node;
            }
        }

        let mut waypoints = vec![origin];
        waypoints.extend(path.iter().map(|&i| points[i]));
        waypoints.push(origin);

        Ok(OptimizedTrip {
            order: path.iter().map(|&i| i - 1).collect(),
            legs,
            geometry: RouteGeometry::from_coordinates(&waypoints),
        })
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// routing service if Valhalla is unavailable or URL is not configured.
pub async fn create_routing_service_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        match check_valhalla_health(&url).await {
            Ok(()) => match ValhallaClient::new(ValhallaConfig::new(&url)) {
                Ok(client) => {
                    info!("Valhalla routing service available at {}", url);
                    return Box::new(client);
                }
                Err(e) => warn!("Failed to build Valhalla client: {}", e),
            },
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock routing.", url, e);
            }
        }
    }

    info!("Using mock routing service (Valhalla not configured or unavailable)");
    Box::new(MockRoutingService::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url);
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}
