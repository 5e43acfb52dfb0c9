//! Inbound text-frame dispatch.

use std::sync::Arc;

use tracing::debug;

use super::connection::ClientConnection;
use super::protocol::{ClientMessage, ServerMessage, parse_client_message};
use super::registry::SubscriptionRegistry;

/// Handle one text frame from `connection`.
///
/// Malformed frames are answered with an `error` event; the connection stays
/// open.
pub async fn handle_message(
    text: &str,
    connection: &Arc<ClientConnection>,
    registry: &SubscriptionRegistry,
) {
    match parse_client_message(text) {
        Ok(ClientMessage::SubscribeBuild(deployment_id)) => {
            registry.subscribe(connection, deployment_id).await;
        }
        Ok(ClientMessage::UnsubscribeBuild(deployment_id)) => {
            registry.unsubscribe(&connection.id, &deployment_id).await;
        }
        Err(message) => {
            debug!(conn_id = %connection.id, error = %message, "rejected client frame");
            let _ = connection.send(ServerMessage::Error(&message).to_frame());
        }
    }
}
