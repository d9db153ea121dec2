//! Planning session handlers
//!
//! Every subject addresses one in-memory session and answers with the
//! session's fresh snapshot, except `fleet.planner.close`.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::authorize;
use crate::auth::PERM_ROUTE_CREATE;
use crate::services::planner::{PlanningSession, SelectionError, PLANNING_SESSIONS};
use crate::types::{
    ErrorResponse, PlanningSnapshot, Request, SelectShuttleRequest, SessionRequest,
    SuccessResponse, ToggleEmployeeRequest,
};

/// Payloads that name the session they act on
pub trait SessionScoped {
    fn session_id(&self) -> Uuid;
}

impl SessionScoped for SessionRequest {
    fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl SessionScoped for SelectShuttleRequest {
    fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl SessionScoped for ToggleEmployeeRequest {
    fn session_id(&self) -> Uuid {
        self.session_id
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosed {
    pub session_id: Uuid,
    pub closed: bool,
}

/// Read-parse-authorize loop shared by the planner subjects; `act` does the
/// subject's work for the caller's organization.
async fn serve_session<T, R, F>(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    subject: &'static str,
    act: F,
) -> Result<()>
where
    T: DeserializeOwned + SessionScoped,
    R: Serialize,
    F: Fn(Uuid, &T) -> Result<R, SelectionError>,
{
    while let Some(msg) = subscriber.next().await {
        debug!("Received {}", subject);

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<T> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth = match authorize(&request, &jwt_secret, PERM_ROUTE_CREATE) {
            Ok(auth) => auth,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match act(auth.organization_id, &request.payload) {
            Ok(result) => {
                let response = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                debug!(
                    "{} rejected for session {}: {}",
                    subject,
                    request.payload.session_id(),
                    e
                );
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

fn mutate(
    organization_id: Uuid,
    session_id: Uuid,
    f: impl FnOnce(&mut PlanningSession) -> Result<(), SelectionError>,
) -> Result<PlanningSnapshot, SelectionError> {
    PLANNING_SESSIONS.update(organization_id, session_id, |session| {
        f(session)?;
        Ok(session.snapshot())
    })
}

/// Handle fleet.planner.get
pub async fn handle_get(client: Client, subscriber: Subscriber, jwt_secret: Arc<String>) -> Result<()> {
    serve_session(client, subscriber, jwt_secret, "fleet.planner.get", |org, p: &SessionRequest| {
        PLANNING_SESSIONS.snapshot(org, p.session_id)
    })
    .await
}

/// Handle fleet.planner.shuttle.select
pub async fn handle_select_shuttle(
    client: Client,
    subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve_session(
        client,
        subscriber,
        jwt_secret,
        "fleet.planner.shuttle.select",
        |org, p: &SelectShuttleRequest| mutate(org, p.session_id, |s| s.select_shuttle(p.shuttle_id)),
    )
    .await
}

/// Handle fleet.planner.cluster.accept
pub async fn handle_accept_cluster(
    client: Client,
    subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve_session(
        client,
        subscriber,
        jwt_secret,
        "fleet.planner.cluster.accept",
        |org, p: &SessionRequest| mutate(org, p.session_id, |s| s.accept_cluster()),
    )
    .await
}

/// Handle fleet.planner.employee.toggle
pub async fn handle_toggle_employee(
    client: Client,
    subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve_session(
        client,
        subscriber,
        jwt_secret,
        "fleet.planner.employee.toggle",
        |org, p: &ToggleEmployeeRequest| mutate(org, p.session_id, |s| s.toggle_employee(p.employee_id)),
    )
    .await
}

/// Handle fleet.planner.clear
pub async fn handle_clear(client: Client, subscriber: Subscriber, jwt_secret: Arc<String>) -> Result<()> {
    serve_session(client, subscriber, jwt_secret, "fleet.planner.clear", |org, p: &SessionRequest| {
        mutate(org, p.session_id, |s| {
            s.clear();
            Ok(())
        })
    })
    .await
}

/// Handle fleet.planner.close
pub async fn handle_close(client: Client, subscriber: Subscriber, jwt_secret: Arc<String>) -> Result<()> {
    serve_session(client, subscriber, jwt_secret, "fleet.planner.close", |org, p: &SessionRequest| {
        PLANNING_SESSIONS.close(org, p.session_id).map(|_| SessionClosed {
            session_id: p.session_id,
            closed: true,
        })
    })
    .await
}
