//! Shuttle availability handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::authorize;
use crate::auth::PERM_VEHICLE_READ;
use crate::config::Config;
use crate::db::queries;
use crate::types::{
    AvailableShuttlesRequest, AvailableShuttlesResponse, CheckVehicleRequest, ErrorResponse,
    Request, SuccessResponse,
};

/// Handle fleet.shuttle.available
pub async fn handle_available(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.shuttle.available");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<AvailableShuttlesRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &config.jwt_secret, PERM_VEHICLE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let org = auth.organization_id;
        let shift = match queries::shift::get_shift(&pool, org, request.payload.shift_id).await {
            Ok(Some(shift)) => shift,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Shift not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load shift: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::vehicle::list_available_for_shift(
            &pool,
            org,
            &shift,
            request.payload.date,
            config.max_route_duration_minutes as i64,
        )
        .await
        {
            Ok(vehicles) => {
                debug!("{} shuttles available for shift {}", vehicles.len(), shift.name);
                let response = SuccessResponse::new(
                    request.id,
                    AvailableShuttlesResponse {
                        count: vehicles.len(),
                        vehicles,
                        shift,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list available shuttles: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle fleet.shuttle.check
pub async fn handle_check(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    config: Arc<Config>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.shuttle.check");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CheckVehicleRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &config.jwt_secret, PERM_VEHICLE_READ) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::vehicle::check_vehicle(
            &pool,
            auth.organization_id,
            &request.payload,
            config.max_route_duration_minutes as i64,
        )
        .await
        {
            Ok(availability) => {
                let response = SuccessResponse::new(request.id, availability);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to check vehicle {}: {}", request.payload.vehicle_id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
