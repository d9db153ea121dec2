//! Vehicle availability queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::services::availability::{evaluate, RouteWindow, VehicleFacts};
use crate::types::{CheckVehicleRequest, Shift, Vehicle, VehicleAvailability};

const VEHICLE_SELECT: &str = r#"
    SELECT v.id, v.organization_id, v.name, v.plate_number, v.category_id,
           c.name AS category_name, v.capacity, c.capacity AS category_capacity,
           v.daily_rate, v.status, v.is_active, v.deleted, v.created_at, v.updated_at
    FROM vehicles v
    LEFT JOIN vehicle_categories c ON c.id = v.category_id
"#;

/// Vehicles free to serve `shift`.
///
/// With a date, routes overlapping the departure window on that date and
/// vehicles marked unavailable for (shift, date) are excluded. Without a
/// date, any live route of the shift excludes its vehicle.
pub async fn list_available_for_shift(
    pool: &PgPool,
    organization_id: Uuid,
    shift: &Shift,
    date: Option<NaiveDate>,
    max_route_minutes: i64,
) -> Result<Vec<Vehicle>> {
    let window = date.map(|d| RouteWindow::for_shift(shift, d, max_route_minutes));

    let sql = format!(
        r#"{}
        WHERE v.organization_id = $1
          AND v.status = 'available' AND v.is_active AND NOT v.deleted
          AND NOT EXISTS (
              SELECT 1 FROM routes r
              WHERE r.vehicle_id = v.id AND NOT r.deleted AND r.status <> 'cancelled'
                AND (
                    ($3::date IS NULL AND r.shift_id = $2)
                    OR (r.date = $3 AND r.start_time <= $5 AND r.end_time >= $4)
                )
          )
          AND NOT EXISTS (
              SELECT 1 FROM vehicle_availability a
              WHERE a.vehicle_id = v.id AND a.shift_id = $2 AND a.date = $3 AND NOT a.available
          )
        ORDER BY v.plate_number ASC
        "#,
        VEHICLE_SELECT
    );

    let vehicles = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(organization_id)
        .bind(shift.id)
        .bind(date)
        .bind(window.map(|w| w.start))
        .bind(window.map(|w| w.end))
        .fetch_all(pool)
        .await?;

    Ok(vehicles)
}

/// Vehicle by id, deleted ones included. `for_update` locks the row.
pub async fn get_vehicle(
    conn: &mut PgConnection,
    organization_id: Uuid,
    id: Uuid,
    for_update: bool,
) -> Result<Option<Vehicle>> {
    let sql = format!(
        "{} WHERE v.id = $1 AND v.organization_id = $2{}",
        VEHICLE_SELECT,
        if for_update { " FOR UPDATE OF v" } else { "" }
    );

    let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(id)
        .bind(organization_id)
        .fetch_optional(conn)
        .await?;

    Ok(vehicle)
}

/// Live routes of the vehicle overlapping `window`
pub async fn count_conflicting_routes(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    window: &RouteWindow,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM routes
        WHERE vehicle_id = $1 AND NOT deleted AND status <> 'cancelled'
          AND start_time <= $3 AND end_time >= $2
        "#,
    )
    .bind(vehicle_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

pub async fn is_marked_unavailable(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    shift_id: Uuid,
    date: NaiveDate,
) -> Result<bool> {
    let marked: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM vehicle_availability
            WHERE vehicle_id = $1 AND shift_id = $2 AND date = $3 AND NOT available
        )
        "#,
    )
    .bind(vehicle_id)
    .bind(shift_id)
    .bind(date)
    .fetch_one(conn)
    .await?;

    Ok(marked)
}

/// Gather the facts about a vehicle for `window` and evaluate them.
pub async fn availability_for_window(
    conn: &mut PgConnection,
    organization_id: Uuid,
    vehicle_id: Uuid,
    shift: Option<&Shift>,
    date: NaiveDate,
    window: &RouteWindow,
    lock: bool,
) -> Result<(VehicleAvailability, Option<Vehicle>)> {
    let Some(shift) = shift else {
        return Ok((evaluate(&VehicleFacts::default()), None));
    };

    let vehicle = get_vehicle(&mut *conn, organization_id, vehicle_id, lock).await?;
    let (conflicting_routes, marked_unavailable) = match &vehicle {
        Some(v) => (
            count_conflicting_routes(&mut *conn, v.id, window).await?,
            is_marked_unavailable(&mut *conn, v.id, shift.id, date).await?,
        ),
        None => (0, false),
    };

    let availability = evaluate(&VehicleFacts {
        shift_found: true,
        vehicle: vehicle.as_ref(),
        conflicting_routes,
        marked_unavailable,
    });

    Ok((availability, vehicle))
}

/// Single vehicle check for an explicit or shift-derived window
pub async fn check_vehicle(
    pool: &PgPool,
    organization_id: Uuid,
    request: &CheckVehicleRequest,
    max_route_minutes: i64,
) -> Result<VehicleAvailability> {
    let shift = super::shift::get_shift(pool, organization_id, request.shift_id).await?;
    let mut conn = pool.acquire().await?;

    let window = match &shift {
        Some(s) => RouteWindow::with_bounds(
            s,
            request.date,
            request.start_time,
            request.end_time,
            max_route_minutes,
        ),
        None => return Ok(evaluate(&VehicleFacts::default())),
    };

    let (availability, _) = availability_for_window(
        &mut conn,
        organization_id,
        request.vehicle_id,
        shift.as_ref(),
        request.date,
        &window,
        false,
    )
    .await?;

    Ok(availability)
}
