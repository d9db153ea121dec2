//! Clustering handlers
//!
//! `fleet.cluster.compute` clusters arbitrary points and shuttles;
//! `fleet.cluster.shift` clusters a shift's unassigned employees into its
//! available shuttles and opens a planning session on the result.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::authorize;
use crate::auth::PERM_ROUTE_CREATE;
use crate::config::Config;
use crate::db::queries;
use crate::services::cancellation::CLUSTER_RUNS;
use crate::services::cluster::{self, ClusterError, SolverConfig};
use crate::services::planner::{PlanningSession, PLANNING_SESSIONS};
use crate::services::routing::RoutingService;
use crate::types::{
    ClusterRequest, ErrorResponse, PlanningSnapshot, Request, ShiftClusterRequest,
    SuccessResponse,
};

fn cluster_error(request_id: Uuid, err: &ClusterError) -> ErrorResponse {
    match err {
        ClusterError::Cancelled => debug!("Clustering run superseded"),
        ClusterError::Solver(e) => error!("Clustering failed: {:#}", e),
        other => warn!("Clustering rejected: {}", other),
    }
    ErrorResponse::new(request_id, err.code(), err.to_string())
}

/// Handle fleet.cluster.compute
pub async fn handle_compute(
    client: Client,
    mut subscriber: Subscriber,
    config: Arc<Config>,
    routing: Arc<dyn RoutingService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.cluster.compute");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ClusterRequest> = match serde_json::from_slice(&msg.payload) {
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

        // Each request is answered from its own task so that a newer run can
        // supersede one still solving
        let client = client.clone();
        let routing = Arc::clone(&routing);
        let solver_config = SolverConfig::interactive(config.cluster_max_seconds);
        tokio::spawn(async move {
            let guard = CLUSTER_RUNS.start(auth.organization_id);
            let bytes = match cluster::cluster_request(routing.as_ref(), &request.payload, solver_config, &guard).await {
                Ok(response) => serde_json::to_vec(&SuccessResponse::new(request.id, response)),
                Err(e) => serde_json::to_vec(&cluster_error(request.id, &e)),
            };
            match bytes {
                Ok(bytes) => {
                    let _ = client.publish(reply, bytes.into()).await;
                }
                Err(e) => error!("Failed to serialize cluster reply: {}", e),
            }
        });
    }

    Ok(())
}

/// Handle fleet.cluster.shift
pub async fn handle_shift(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
    routing: Arc<dyn RoutingService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.cluster.shift");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ShiftClusterRequest> = match serde_json::from_slice(&msg.payload) {
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

        let client = client.clone();
        let pool = pool.clone();
        let config = Arc::clone(&config);
        let routing = Arc::clone(&routing);
        tokio::spawn(async move {
            let result = open_shift_session(
                &pool,
                &config,
                routing.as_ref(),
                auth.organization_id,
                &request.payload,
                request.id,
            )
            .await;
            let bytes = match result {
                Ok(snapshot) => serde_json::to_vec(&SuccessResponse::new(request.id, snapshot)),
                Err(error) => serde_json::to_vec(&error),
            };
            match bytes {
                Ok(bytes) => {
                    let _ = client.publish(reply, bytes.into()).await;
                }
                Err(e) => error!("Failed to serialize planning reply: {}", e),
            }
        });
    }

    Ok(())
}

async fn open_shift_session(
    pool: &PgPool,
    config: &Config,
    routing: &dyn RoutingService,
    organization_id: Uuid,
    payload: &ShiftClusterRequest,
    request_id: Uuid,
) -> Result<PlanningSnapshot, ErrorResponse> {
    let db_error = |e: anyhow::Error| {
        error!("Shift clustering query failed: {}", e);
        ErrorResponse::new(request_id, "DATABASE_ERROR", e.to_string())
    };

    let shift = queries::shift::get_shift(pool, organization_id, payload.shift_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ErrorResponse::new(request_id, "NOT_FOUND", "Shift not found"))?;
    let location = queries::location::get_location(pool, organization_id, payload.location_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ErrorResponse::new(request_id, "NOT_FOUND", "Location not found"))?;

    let vehicles = queries::vehicle::list_available_for_shift(
        pool,
        organization_id,
        &shift,
        payload.date,
        config.max_route_duration_minutes as i64,
    )
    .await
    .map_err(db_error)?;
    let employees = queries::employee::list_unassigned(pool, organization_id, shift.id, location.id)
        .await
        .map_err(db_error)?;

    let shift_problem = cluster::shift_problem(&location, &vehicles, employees, config.hq)
        .map_err(|e| cluster_error(request_id, &e))?;
    if shift_problem.capacity_exceeded {
        info!(
            "Shift {} has more riders than seats: deferring {} employees",
            shift.name,
            shift_problem.deferred_employee_ids.len()
        );
    }

    let plan = if shift_problem.is_empty() {
        None
    } else {
        let guard = CLUSTER_RUNS.start(organization_id);
        let plan = cluster::run_clustering(
            routing,
            shift_problem.problem.clone(),
            SolverConfig::interactive(config.cluster_max_seconds),
            &guard,
        )
        .await
        .map_err(|e| cluster_error(request_id, &e))?;
        Some(plan)
    };

    let seed = shift_problem.into_seed(organization_id, shift.id, location.id, payload.date, plan.as_ref());
    Ok(PLANNING_SESSIONS.open(PlanningSession::new(seed)))
}
