//! Employee handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::authorize;
use crate::auth::PERM_ROUTE_READ;
use crate::db::queries;
use crate::types::{
    EmployeeListResponse, ErrorResponse, Request, SuccessResponse, UnassignedEmployeesRequest,
};

/// Handle fleet.employee.unassigned
pub async fn handle_unassigned(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received fleet.employee.unassigned");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UnassignedEmployeesRequest> = match serde_json::from_slice(&msg.payload) {
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

        let payload = &request.payload;
        match queries::employee::list_unassigned(
            &pool,
            auth.organization_id,
            payload.shift_id,
            payload.location_id,
        )
        .await
        {
            Ok(items) => {
                let total = items.len() as i64;
                let response = SuccessResponse::new(request.id, EmployeeListResponse { items, total });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list unassigned employees: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
