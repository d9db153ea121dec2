//! Route preview: optimized stop order, distance and duration for a set of
//! employees before the route is committed.

use std::collections::HashSet;

use chrono::NaiveTime;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::naming::suggest_route_name;
use crate::services::routing::{MockRoutingService, OptimizedTrip, RoutingService, TripLeg};
use crate::types::{Coordinates, PlanningEmployee, PreviewStop, RoutePreviewResponse};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("None of the selected employees has a valid stop")]
    NoValidStops,
    #[error("Routing failed: {0}")]
    Routing(#[from] anyhow::Error),
}

impl PreviewError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoValidStops => "NO_VALID_STOPS",
            Self::Routing(_) => "ROUTING_ERROR",
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn minutes_ceil(seconds: f64) -> i32 {
    (seconds / 60.0).ceil().max(0.0) as i32
}

/// Preview the round trip HQ -> stops -> HQ for `requested` employees.
///
/// `employees` are the organization's records for the requested ids;
/// requested ids without a record or without a usable stop are skipped.
pub async fn preview_route(
    routing: &dyn RoutingService,
    hq: Coordinates,
    employees: &[PlanningEmployee],
    requested: &[Uuid],
    shift_end: Option<NaiveTime>,
    max_duration_minutes: u32,
) -> Result<RoutePreviewResponse, PreviewError> {
    let mut seen = HashSet::new();
    let mut riders: Vec<(&PlanningEmployee, Coordinates)> = Vec::new();
    let mut skipped = Vec::new();

    for id in requested {
        if !seen.insert(*id) {
            continue;
        }
        match employees.iter().find(|e| e.id == *id) {
            Some(e) => match e.stop_coordinates() {
                Some(c) => riders.push((e, c)),
                None => skipped.push(*id),
            },
            None => skipped.push(*id),
        }
    }

    if riders.is_empty() {
        return Err(PreviewError::NoValidStops);
    }
    if !skipped.is_empty() {
        debug!("Preview skipping {} employees without stops", skipped.len());
    }

    let stops: Vec<Coordinates> = riders.iter().map(|(_, c)| *c).collect();
    let (trip, backend) = match routing.optimize_round_trip(hq, &stops).await {
        Ok(trip) => (trip, routing.name().to_string()),
        Err(e) => {
            warn!("{} optimization failed, using estimates: {}", routing.name(), e);
            let fallback = MockRoutingService::new();
            let trip = fallback.optimize_round_trip(hq, &stops).await?;
            (trip, fallback.name().to_string())
        }
    };

    Ok(assemble(hq, &riders, skipped, trip, backend, shift_end, max_duration_minutes))
}

fn assemble(
    hq: Coordinates,
    riders: &[(&PlanningEmployee, Coordinates)],
    skipped_employee_ids: Vec<Uuid>,
    trip: OptimizedTrip,
    backend: String,
    shift_end: Option<NaiveTime>,
    max_duration_minutes: u32,
) -> RoutePreviewResponse {
    let stops: Vec<PreviewStop> = trip
        .order
        .iter()
        .enumerate()
        .filter_map(|(position, &index)| {
            let (employee, coordinates) = riders.get(index)?;
            let stop_id = employee.stop_id?;
            let leg = trip.legs.get(position).copied().unwrap_or(TripLeg {
                distance_km: 0.0,
                duration_seconds: 0.0,
            });
            Some(PreviewStop {
                order: position as i32 + 1,
                employee_id: employee.id,
                employee_name: employee.name.clone(),
                stop_id,
                coordinates: *coordinates,
                area: employee.area_label(),
                distance_from_previous_km: round_to(leg.distance_km, 2),
                duration_from_previous_minutes: round_to(leg.duration_seconds / 60.0, 1),
            })
        })
        .collect();

    let total_distance_km = round_to(trip.total_distance_km(), 1);
    let total_time_minutes = minutes_ceil(trip.total_duration_seconds());

    let selected: Vec<PlanningEmployee> = riders.iter().map(|(e, _)| (*e).clone()).collect();
    let suggested_name = suggest_route_name(&hq, &selected, shift_end).map(|s| s.name);

    RoutePreviewResponse {
        hq,
        stops,
        skipped_employee_ids,
        total_distance_km,
        total_time_minutes,
        geometry: trip.geometry.coordinates,
        max_duration_minutes,
        within_duration_limit: total_time_minutes <= max_duration_minutes as i32,
        suggested_name,
        backend,
    }
}
