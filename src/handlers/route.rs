//! Route handlers: naming, preview, commit and the stored route lifecycle

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::NaiveTime;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::authorize;
use crate::auth::{PERM_ROUTE_CREATE, PERM_ROUTE_DELETE, PERM_ROUTE_READ};
use crate::config::Config;
use crate::db::queries;
use crate::services::commit::{validate_create_request, CommitError};
use crate::services::naming::{in_request_order, suggest_route_name};
use crate::services::planner::PLANNING_SESSIONS;
use crate::services::preview::preview_route;
use crate::services::routing::RoutingService;
use crate::types::{
    Coordinates, CreateRouteRequest, ErrorResponse, IdRequest, ListRoutesRequest,
    PlanningEmployee, Request, RouteListResponse, RoutePreviewRequest, SuccessResponse,
    SuggestNameRequest, SuggestNameResponse,
};

/// Employees picked for a route plus where and when it leaves
struct Selection {
    employees: Vec<PlanningEmployee>,
    hq: Coordinates,
    shift_end: Option<NaiveTime>,
}

async fn load_selection(
    pool: &PgPool,
    config: &Config,
    organization_id: Uuid,
    employee_ids: &[Uuid],
    location_id: Option<Uuid>,
    shift_id: Option<Uuid>,
    request_id: Uuid,
) -> Result<Selection, ErrorResponse> {
    let db_error = |e: anyhow::Error| {
        error!("Failed to load route selection: {}", e);
        ErrorResponse::new(request_id, "DATABASE_ERROR", e.to_string())
    };

    let hq = match location_id {
        Some(id) => queries::location::get_location(pool, organization_id, id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ErrorResponse::new(request_id, "NOT_FOUND", "Location not found"))?
            .coordinates()
            .unwrap_or(config.hq),
        None => config.hq,
    };

    let shift_end = match shift_id {
        Some(id) => Some(
            queries::shift::get_shift(pool, organization_id, id)
                .await
                .map_err(db_error)?
                .ok_or_else(|| ErrorResponse::new(request_id, "NOT_FOUND", "Shift not found"))?
                .end_time,
        ),
        None => None,
    };

    let employees = queries::employee::list_by_ids(pool, organization_id, employee_ids)
        .await
        .map_err(db_error)?;
    let employees = in_request_order(employees, employee_ids);

    Ok(Selection { employees, hq, shift_end })
}

fn commit_error(request_id: Uuid, err: &CommitError) -> ErrorResponse {
    match err {
        CommitError::Database(e) => error!("Route commit failed: {:#}", e),
        other => warn!("Route commit rejected: {}", other),
    }
    let response = ErrorResponse::new(request_id, err.code(), err.to_string());
    match err.details() {
        Some(details) => response.with_details(details),
        None => response,
    }
}

/// Handle fleet.route.suggest_name
pub async fn handle_suggest_name(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.suggest_name");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SuggestNameRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &config.jwt_secret, PERM_ROUTE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = &request.payload;
        let selection = match load_selection(
            &pool,
            &config,
            auth.organization_id,
            &payload.employee_ids,
            payload.location_id,
            payload.shift_id,
            request.id,
        )
        .await
        {
            Ok(selection) => selection,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let suggestion = suggest_route_name(&selection.hq, &selection.employees, selection.shift_end);
        let response = SuccessResponse::new(
            request.id,
            SuggestNameResponse {
                name: suggestion.as_ref().map(|s| s.name.clone()),
                furthest_employee_id: suggestion.as_ref().map(|s| s.furthest_employee_id),
                furthest_distance_km: suggestion.as_ref().map(|s| s.furthest_distance_km),
            },
        );
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle fleet.route.preview
pub async fn handle_preview(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
    routing: Arc<dyn RoutingService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.preview");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RoutePreviewRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &config.jwt_secret, PERM_ROUTE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = &request.payload;
        let selection = match load_selection(
            &pool,
            &config,
            auth.organization_id,
            &payload.employee_ids,
            payload.location_id,
            payload.shift_id,
            request.id,
        )
        .await
        {
            Ok(selection) => selection,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match preview_route(
            routing.as_ref(),
            selection.hq,
            &selection.employees,
            &payload.employee_ids,
            selection.shift_end,
            config.max_route_duration_minutes,
        )
        .await
        {
            Ok(preview) => {
                debug!(
                    "Preview: {} stops, {} km, {} min via {}",
                    preview.stops.len(),
                    preview.total_distance_km,
                    preview.total_time_minutes,
                    preview.backend
                );
                let response = SuccessResponse::new(request.id, preview);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                warn!("Route preview failed: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle fleet.route.create
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.create");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &config.jwt_secret, PERM_ROUTE_CREATE) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let name = match validate_create_request(&request.payload, config.max_route_duration_minutes) {
            Ok(name) => name,
            Err(e) => {
                let error = commit_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::route::create_route(&pool, auth.organization_id, &name, &request.payload).await {
            Ok(route) => {
                if let Some(session_id) = request.payload.session_id {
                    if let Err(e) = PLANNING_SESSIONS.close(auth.organization_id, session_id) {
                        debug!("Planning session {} not closed: {}", session_id, e);
                    }
                }
                let response = SuccessResponse::new(request.id, route);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                let error = commit_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle fleet.route.list
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.list");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRoutesRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &jwt_secret, PERM_ROUTE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::route::list_routes(
            &pool,
            auth.organization_id,
            request.payload.shift_id,
            request.payload.date,
        )
        .await
        {
            Ok(items) => {
                let total = items.len() as i64;
                let response = SuccessResponse::new(request.id, RouteListResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list routes: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle fleet.route.get
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.get");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<IdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &jwt_secret, PERM_ROUTE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::route::get_route(&pool, auth.organization_id, request.payload.id).await {
            Ok(Some(route)) => {
                let response = SuccessResponse::new(request.id, route);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Route not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get route: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle fleet.route.delete
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.route.delete");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<IdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &jwt_secret, PERM_ROUTE_DELETE) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::route::delete_route(&pool, auth.organization_id, request.payload.id).await {
            Ok(route) => {
                info!("Route {} deleted by {}", route.id, auth.user_id);
                let response = SuccessResponse::new(request.id, route);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                let error = commit_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UnavailableReason, VehicleAvailability};

    #[test]
    fn test_commit_error_reply_carries_details() {
        let err = CommitError::EmployeesUnavailable(vec![Uuid::nil()]);
        let response = commit_error(Uuid::nil(), &err);
        assert_eq!(response.error.code, "EMPLOYEES_UNAVAILABLE");
        let details = response.error.details.unwrap();
        assert_eq!(details["employeeIds"][0], Uuid::nil().to_string());
    }

    #[test]
    fn test_commit_error_reply_without_details() {
        let response = commit_error(Uuid::nil(), &CommitError::AlreadyDeleted);
        assert_eq!(response.error.code, "ALREADY_DELETED");
        assert!(response.error.details.is_none());

        let response = commit_error(
            Uuid::nil(),
            &CommitError::VehicleUnavailable(VehicleAvailability::unavailable(
                UnavailableReason::Maintenance,
            )),
        );
        assert_eq!(response.error.code, "VEHICLE_UNAVAILABLE");
        assert!(response.error.details.is_some());
    }
}
