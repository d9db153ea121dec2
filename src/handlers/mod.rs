//! NATS message handlers

pub mod cluster;
pub mod employee;
pub mod location;
pub mod ping;
pub mod planner;
pub mod route;
pub mod vehicle;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info, warn};

use crate::auth::{extract_auth, AuthInfo};
use crate::config::Config;
use crate::services::routing::{create_routing_service_with_fallback, RoutingService};
use crate::types::{ErrorResponse, Request};

/// Authenticate a request and check one permission, producing the error
/// reply to publish when either fails.
pub(crate) fn authorize<T>(
    request: &Request<T>,
    jwt_secret: &str,
    permission: &str,
) -> Result<AuthInfo, ErrorResponse> {
    let auth = extract_auth(request, jwt_secret).map_err(|e| {
        warn!("Rejected unauthenticated request {}: {}", request.id, e);
        ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required")
    })?;

    auth.require(permission).map_err(|e| {
        warn!("User {} denied: {}", auth.user_id, e);
        ErrorResponse::new(request.id, "FORBIDDEN", e.to_string())
    })?;

    Ok(auth)
}

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: Config) -> Result<()> {
    info!("Starting message handlers...");

    // Routing backend with automatic Valhalla detection
    let routing: Arc<dyn RoutingService> =
        Arc::from(create_routing_service_with_fallback(config.valhalla_url.clone()).await);
    info!("Routing service initialized: {}", routing.name());

    let config = Arc::new(config);
    let jwt_secret = Arc::new(config.jwt_secret.clone());

    // Subscribe to all subjects
    let ping_sub = client.subscribe("fleet.ping").await?;
    let location_list_sub = client.subscribe("fleet.location.list").await?;
    let shift_list_sub = client.subscribe("fleet.shift.list").await?;
    let shuttle_available_sub = client.subscribe("fleet.shuttle.available").await?;
    let shuttle_check_sub = client.subscribe("fleet.shuttle.check").await?;
    let employee_unassigned_sub = client.subscribe("fleet.employee.unassigned").await?;

    // Clustering and planning sessions
    let cluster_compute_sub = client.subscribe("fleet.cluster.compute").await?;
    let cluster_shift_sub = client.subscribe("fleet.cluster.shift").await?;
    let planner_get_sub = client.subscribe("fleet.planner.get").await?;
    let planner_select_sub = client.subscribe("fleet.planner.shuttle.select").await?;
    let planner_accept_sub = client.subscribe("fleet.planner.cluster.accept").await?;
    let planner_toggle_sub = client.subscribe("fleet.planner.employee.toggle").await?;
    let planner_clear_sub = client.subscribe("fleet.planner.clear").await?;
    let planner_close_sub = client.subscribe("fleet.planner.close").await?;

    // Routes
    let route_name_sub = client.subscribe("fleet.route.suggest_name").await?;
    let route_preview_sub = client.subscribe("fleet.route.preview").await?;
    let route_create_sub = client.subscribe("fleet.route.create").await?;
    let route_list_sub = client.subscribe("fleet.route.list").await?;
    let route_get_sub = client.subscribe("fleet.route.get").await?;
    let route_delete_sub = client.subscribe("fleet.route.delete").await?;

    info!("Subscribed to NATS subjects");

    let ping_handle = tokio::spawn(ping::handle_ping(client.clone(), ping_sub));
    let location_list_handle = tokio::spawn(location::handle_list_locations(
        client.clone(),
        location_list_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));
    let shift_list_handle = tokio::spawn(location::handle_list_shifts(
        client.clone(),
        shift_list_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));
    let shuttle_available_handle = tokio::spawn(vehicle::handle_available(
        client.clone(),
        shuttle_available_sub,
        pool.clone(),
        Arc::clone(&config),
    ));
    let shuttle_check_handle = tokio::spawn(vehicle::handle_check(
        client.clone(),
        shuttle_check_sub,
        pool.clone(),
        Arc::clone(&config),
    ));
    let employee_unassigned_handle = tokio::spawn(employee::handle_unassigned(
        client.clone(),
        employee_unassigned_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));

    let cluster_compute_handle = tokio::spawn(cluster::handle_compute(
        client.clone(),
        cluster_compute_sub,
        Arc::clone(&config),
        Arc::clone(&routing),
    ));
    let cluster_shift_handle = tokio::spawn(cluster::handle_shift(
        client.clone(),
        cluster_shift_sub,
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&routing),
    ));
    let planner_get_handle = tokio::spawn(planner::handle_get(
        client.clone(),
        planner_get_sub,
        Arc::clone(&jwt_secret),
    ));
    let planner_select_handle = tokio::spawn(planner::handle_select_shuttle(
        client.clone(),
        planner_select_sub,
        Arc::clone(&jwt_secret),
    ));
    let planner_accept_handle = tokio::spawn(planner::handle_accept_cluster(
        client.clone(),
        planner_accept_sub,
        Arc::clone(&jwt_secret),
    ));
    let planner_toggle_handle = tokio::spawn(planner::handle_toggle_employee(
        client.clone(),
        planner_toggle_sub,
        Arc::clone(&jwt_secret),
    ));
    let planner_clear_handle = tokio::spawn(planner::handle_clear(
        client.clone(),
        planner_clear_sub,
        Arc::clone(&jwt_secret),
    ));
    let planner_close_handle = tokio::spawn(planner::handle_close(
        client.clone(),
        planner_close_sub,
        Arc::clone(&jwt_secret),
    ));

    let route_name_handle = tokio::spawn(route::handle_suggest_name(
        client.clone(),
        route_name_sub,
        pool.clone(),
        Arc::clone(&config),
    ));
    let route_preview_handle = tokio::spawn(route::handle_preview(
        client.clone(),
        route_preview_sub,
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&routing),
    ));
    let route_create_handle = tokio::spawn(route::handle_create(
        client.clone(),
        route_create_sub,
        pool.clone(),
        Arc::clone(&config),
    ));
    let route_list_handle = tokio::spawn(route::handle_list(
        client.clone(),
        route_list_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));
    let route_get_handle = tokio::spawn(route::handle_get(
        client.clone(),
        route_get_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));
    let route_delete_handle = tokio::spawn(route::handle_delete(
        client.clone(),
        route_delete_sub,
        pool.clone(),
        Arc::clone(&jwt_secret),
    ));

    info!("All handlers started, waiting for messages...");

    // Any handler ending means its subscription closed
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = location_list_handle => {
            error!("Location list handler finished: {:?}", result);
        }
        result = shift_list_handle => {
            error!("Shift list handler finished: {:?}", result);
        }
        result = shuttle_available_handle => {
            error!("Shuttle available handler finished: {:?}", result);
        }
        result = shuttle_check_handle => {
            error!("Shuttle check handler finished: {:?}", result);
        }
        result = employee_unassigned_handle => {
            error!("Unassigned employees handler finished: {:?}", result);
        }
        result = cluster_compute_handle => {
            error!("Cluster compute handler finished: {:?}", result);
        }
        result = cluster_shift_handle => {
            error!("Shift clustering handler finished: {:?}", result);
        }
        result = planner_get_handle => {
            error!("Planner get handler finished: {:?}", result);
        }
        result = planner_select_handle => {
            error!("Planner shuttle select handler finished: {:?}", result);
        }
        result = planner_accept_handle => {
            error!("Planner cluster accept handler finished: {:?}", result);
        }
        result = planner_toggle_handle => {
            error!("Planner employee toggle handler finished: {:?}", result);
        }
        result = planner_clear_handle => {
            error!("Planner clear handler finished: {:?}", result);
        }
        result = planner_close_handle => {
            error!("Planner close handler finished: {:?}", result);
        }
        result = route_name_handle => {
            error!("Route name handler finished: {:?}", result);
        }
        result = route_preview_handle => {
            error!("Route preview handler finished: {:?}", result);
        }
        result = route_create_handle => {
            error!("Route create handler finished: {:?}", result);
        }
        result = route_list_handle => {
            error!("Route list handler finished: {:?}", result);
        }
        result = route_get_handle => {
            error!("Route get handler finished: {:?}", result);
        }
        result = route_delete_handle => {
            error!("Route delete handler finished: {:?}", result);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_token, PERM_ROUTE_CREATE, PERM_ROUTE_READ};
    use crate::types::EmptyPayload;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn request_with(permissions: &[&str]) -> Request<EmptyPayload> {
        let perms: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        let token = generate_token(Uuid::new_v4(), Uuid::new_v4(), "planner", &perms, SECRET).unwrap();
        Request::with_token(token, EmptyPayload {})
    }

    #[test]
    fn test_authorize_grants_listed_permission() {
        let request = request_with(&[PERM_ROUTE_READ]);
        let auth = authorize(&request, SECRET, PERM_ROUTE_READ).unwrap();
        assert_eq!(auth.role, "planner");
    }

    #[test]
    fn test_authorize_forbids_missing_permission() {
        let request = request_with(&[PERM_ROUTE_READ]);
        let error = authorize(&request, SECRET, PERM_ROUTE_CREATE).unwrap_err();
        assert_eq!(error.error.code, "FORBIDDEN");
        assert_eq!(error.id, request.id);
    }

    #[test]
    fn test_authorize_requires_token() {
        let mut request = request_with(&["*"]);
        request.token = None;
        let error = authorize(&request, SECRET, PERM_ROUTE_READ).unwrap_err();
        assert_eq!(error.error.code, "UNAUTHORIZED");
    }

    #[test]
    fn test_authorize_rejects_foreign_signature() {
        let request = request_with(&["*"]);
        let error = authorize(&request, "another-secret-key-that-is-32-bytes-long!", PERM_ROUTE_READ)
            .unwrap_err();
        assert_eq!(error.error.code, "UNAUTHORIZED");
    }
}
