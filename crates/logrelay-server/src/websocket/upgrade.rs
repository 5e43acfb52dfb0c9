//! `GET /ws` handshake: origin, credential, capacity, then upgrade.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use logrelay_core::{ConnectionId, Identity};
use metrics::counter;
use serde::Deserialize;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{info, warn};

use super::session::run_connection;
use crate::errors::RelayError;
use crate::metrics::WS_HANDSHAKE_REJECTIONS_TOTAL;
use crate::origin::request_origin;
use crate::server::AppState;

/// Query parameters accepted on the upgrade request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Handshake credential.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws`
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (identity, permit) = match admit(&state, &headers, params.token.as_deref()).await {
        Ok(admitted) => admitted,
        Err(err) => {
            counter!(WS_HANDSHAKE_REJECTIONS_TOTAL, "reason" => err.reason()).increment(1);
            return err.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let conn_id = ConnectionId::new();
    info!(conn_id = %conn_id, subject = %identity.subject, "handshake accepted");

    let registry = Arc::clone(&state.registry);
    let config = Arc::clone(&state.config);
    let shutdown = state.shutdown.token();
    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|error| warn!(error = %error, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            run_connection(socket, conn_id, identity, registry, config, shutdown, permit)
        })
}

/// Run the handshake checks in order. Nothing is registered on failure.
async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    token: Option<&str>,
) -> Result<(Identity, OwnedSemaphorePermit), RelayError> {
    state.origins.check(request_origin(headers))?;

    let identity = state.gate.authenticate(token).await.map_err(|err| {
        warn!(reason = err.reason(), error = %err, "handshake authentication failed");
        RelayError::from(err)
    })?;

    let permit = Arc::clone(&state.slots).try_acquire_owned().map_err(|_| {
        warn!(limit = state.config.max_connections, "connection limit reached");
        RelayError::CapacityExceeded {
            limit: state.config.max_connections,
        }
    })?;

    Ok((identity, permit))
}
