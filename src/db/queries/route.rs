//! Route database queries

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::services::availability::RouteWindow;
use crate::services::commit::CommitError;
use crate::types::{CreateRouteRequest, Route, RouteStatus, RouteStopRow, RouteWithStops};

use super::{location, shift, vehicle};

const ROUTE_COLUMNS: &str = "id, organization_id, name, vehicle_id, shift_id, location_id, date, \
     start_time, end_time, total_distance_km, total_time_minutes, status, deleted, \
     created_at, updated_at";

/// Live routes of a shift, optionally on one date
pub async fn list_routes(
    pool: &PgPool,
    organization_id: Uuid,
    shift_id: Uuid,
    date: Option<NaiveDate>,
) -> Result<Vec<Route>> {
    let sql = format!(
        "SELECT {} FROM routes
         WHERE organization_id = $1 AND shift_id = $2 AND NOT deleted
           AND ($3::date IS NULL OR date = $3)
         ORDER BY date DESC, start_time ASC, name ASC",
        ROUTE_COLUMNS
    );

    let routes = sqlx::query_as::<_, Route>(&sql)
        .bind(organization_id)
        .bind(shift_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

    Ok(routes)
}

/// Route with its stops in riding order
pub async fn get_route(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Option<RouteWithStops>> {
    let sql = format!(
        "SELECT {} FROM routes WHERE id = $1 AND organization_id = $2",
        ROUTE_COLUMNS
    );

    let route = sqlx::query_as::<_, Route>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

    match route {
        Some(route) => {
            let stops = list_route_stops(pool, route.id).await?;
            Ok(Some(RouteWithStops { route, stops }))
        }
        None => Ok(None),
    }
}

pub async fn list_route_stops(pool: &PgPool, route_id: Uuid) -> Result<Vec<RouteStopRow>> {
    let stops = sqlx::query_as::<_, RouteStopRow>(
        r#"
        SELECT s.id AS stop_id, s.sequence, s.latitude, s.longitude, s.address,
               s.estimated_arrival_time, e.id AS employee_id, e.name AS employee_name
        FROM stops s
        LEFT JOIN employees e ON e.stop_id = s.id
        WHERE s.route_id = $1
        ORDER BY s.sequence ASC NULLS LAST
        "#,
    )
    .bind(route_id)
    .fetch_all(pool)
    .await?;

    Ok(stops)
}

/// Store a validated route request.
///
/// Location, shift, vehicle, employees and stops are checked inside the
/// transaction that writes the route, with the vehicle and employee rows
/// locked so concurrent commits cannot double-book them.
pub async fn create_route(
    pool: &PgPool,
    organization_id: Uuid,
    name: &str,
    request: &CreateRouteRequest,
) -> Result<RouteWithStops, CommitError> {
    if location::get_location(pool, organization_id, request.location_id)
        .await?
        .is_none()
    {
        return Err(CommitError::NotFound("Location"));
    }
    let shift = shift::get_shift(pool, organization_id, request.shift_id)
        .await?
        .ok_or(CommitError::NotFound("Shift"))?;

    let window = RouteWindow::for_shift(&shift, request.date, request.total_time_minutes as i64);

    let mut tx = pool.begin().await?;

    let (availability, found) = vehicle::availability_for_window(
        &mut tx,
        organization_id,
        request.vehicle_id,
        Some(&shift),
        request.date,
        &window,
        true,
    )
    .await?;
    let vehicle = match found {
        Some(v) if availability.available => v,
        _ => return Err(CommitError::VehicleUnavailable(availability)),
    };

    let capacity = vehicle.seat_capacity();
    if request.stops.len() > capacity as usize {
        return Err(CommitError::CapacityExceeded {
            stops: request.stops.len(),
            capacity,
        });
    }

    check_riders(&mut tx, organization_id, request).await?;

    let sql = format!(
        "INSERT INTO routes (organization_id, name, vehicle_id, shift_id, location_id, date,
                             start_time, end_time, total_distance_km, total_time_minutes, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {}",
        ROUTE_COLUMNS
    );
    let route = sqlx::query_as::<_, Route>(&sql)
        .bind(organization_id)
        .bind(name)
        .bind(request.vehicle_id)
        .bind(request.shift_id)
        .bind(request.location_id)
        .bind(request.date)
        .bind(window.start)
        .bind(window.end)
        .bind(request.total_distance_km)
        .bind(request.total_time_minutes)
        .bind(RouteStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

    let stop_ids: Vec<Uuid> = request.stops.iter().map(|s| s.stop_id).collect();
    let sequences: Vec<i32> = (1..=request.stops.len() as i32).collect();
    sqlx::query(
        r#"
        UPDATE stops s SET route_id = $1, sequence = v.seq
        FROM UNNEST($2::uuid[], $3::int[]) AS v(id, seq)
        WHERE s.id = v.id
        "#,
    )
    .bind(route.id)
    .bind(&stop_ids)
    .bind(&sequences)
    .execute(&mut *tx)
    .await?;

    let employee_ids: Vec<Uuid> = request.stops.iter().map(|s| s.employee_id).collect();
    sqlx::query("UPDATE employees SET assigned = TRUE WHERE id = ANY($1)")
        .bind(&employee_ids)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO vehicle_availability
            (organization_id, vehicle_id, shift_id, date, start_time, end_time, available, route_id)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
        ON CONFLICT (vehicle_id, shift_id, date) DO UPDATE
        SET start_time = EXCLUDED.start_time,
            end_time = EXCLUDED.end_time,
            available = FALSE,
            route_id = EXCLUDED.route_id,
            updated_at = NOW()
        "#,
    )
    .bind(organization_id)
    .bind(request.vehicle_id)
    .bind(request.shift_id)
    .bind(request.date)
    .bind(window.start)
    .bind(window.end)
    .bind(route.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "Created route {} '{}' with {} stops on vehicle {}",
        route.id,
        route.name,
        request.stops.len(),
        vehicle.plate_number
    );

    let stops = list_route_stops(pool, route.id).await?;
    Ok(RouteWithStops { route, stops })
}

/// Employees must be unassigned members of the organization; each stop
/// must be its employee's own stop and not on a route yet.
async fn check_riders(
    conn: &mut PgConnection,
    organization_id: Uuid,
    request: &CreateRouteRequest,
) -> Result<(), CommitError> {
    let employee_ids: Vec<Uuid> = request.stops.iter().map(|s| s.employee_id).collect();

    let rows: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as(
        r#"
        SELECT id, stop_id FROM employees
        WHERE organization_id = $1 AND id = ANY($2) AND NOT assigned AND NOT deleted
        FOR UPDATE
        "#,
    )
    .bind(organization_id)
    .bind(&employee_ids)
    .fetch_all(&mut *conn)
    .await?;
    let stop_of: HashMap<Uuid, Option<Uuid>> = rows.into_iter().collect();

    let unavailable: Vec<Uuid> = employee_ids
        .iter()
        .copied()
        .filter(|id| !stop_of.contains_key(id))
        .collect();
    if !unavailable.is_empty() {
        return Err(CommitError::EmployeesUnavailable(unavailable));
    }

    let stop_ids: Vec<Uuid> = request.stops.iter().map(|s| s.stop_id).collect();
    let free: HashSet<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM stops
        WHERE organization_id = $1 AND id = ANY($2) AND route_id IS NULL
        FOR UPDATE
        "#,
    )
    .bind(organization_id)
    .bind(&stop_ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    let invalid: Vec<Uuid> = request
        .stops
        .iter()
        .filter(|s| !free.contains(&s.stop_id) || stop_of.get(&s.employee_id) != Some(&Some(s.stop_id)))
        .map(|s| s.stop_id)
        .collect();
    if !invalid.is_empty() {
        return Err(CommitError::StopsInvalid(invalid));
    }

    Ok(())
}

/// Soft-delete a route and release its employees, stops and vehicle slot.
pub async fn delete_route(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<Route, CommitError> {
    let mut tx = pool.begin().await?;

    let deleted: Option<bool> = sqlx::query_scalar(
        "SELECT deleted FROM routes WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *tx)
    .await?;

    match deleted {
        None => return Err(CommitError::NotFound("Route")),
        Some(true) => return Err(CommitError::AlreadyDeleted),
        Some(false) => {}
    }

    let sql = format!(
        "UPDATE routes SET deleted = TRUE, status = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        ROUTE_COLUMNS
    );
    let route = sqlx::query_as::<_, Route>(&sql)
        .bind(id)
        .bind(RouteStatus::Inactive)
        .fetch_one(&mut *tx)
        .await?;

    let released = sqlx::query(
        "UPDATE employees SET assigned = FALSE
         WHERE stop_id IN (SELECT id FROM stops WHERE route_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query(
        "UPDATE stops SET route_id = NULL, sequence = NULL, estimated_arrival_time = NULL
         WHERE route_id = $1",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE vehicle_availability SET available = TRUE, route_id = NULL, updated_at = NOW()
         WHERE route_id = $1",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Deleted route {} and released {} employees", id, released);
    Ok(route)
}
