//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use logrelay_core::{ConnectionId, Identity};
use metrics::{counter, gauge, histogram};
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::ClientConnection;
use super::handler::handle_message;
use super::heartbeat::run_heartbeat;
use super::registry::SubscriptionRegistry;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Serve one upgraded socket until it closes.
///
/// 1. Registers the connection
/// 2. Forwards queued frames to the socket and pings on the heartbeat interval
/// 3. Dispatches inbound text frames
/// 4. On any exit path, leaves every room and deregisters
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_connection(
    socket: WebSocket,
    conn_id: ConnectionId,
    identity: Identity,
    registry: Arc<SubscriptionRegistry>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
    permit: OwnedSemaphorePermit,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::with_id(conn_id, identity, send_tx));

    info!(subject = %connection.identity.subject, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    registry.register(connection.clone()).await;

    let writer_conn = connection.clone();
    let ping_every = config.heartbeat_interval;
    let writer = tokio::spawn(async move {
        let mut ping = time::interval(ping_every);
        let _ = ping.tick().await;
        loop {
            tokio::select! {
                biased;
                () = writer_conn.closed() => break,
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        writer_conn.close();
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let heartbeat = tokio::spawn(run_heartbeat(
        connection.clone(),
        config.heartbeat_interval,
        config.heartbeat_timeout,
        connection.close_token(),
    ));

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing client");
                break;
            }
            () = connection.closed() => break,
            next = ws_rx.next() => next,
        };
        let Some(Ok(msg)) = next else { break };
        connection.mark_alive();
        match msg {
            Message::Text(text) => handle_message(text.as_str(), &connection, &registry).await,
            Message::Binary(data) => debug!(len = data.len(), "ignoring binary frame"),
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    connection.close();
    registry.deregister(&connection.id).await;
    let _ = writer.await;
    let _ = heartbeat.await;

    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS)
        .record(connection.connected_at.elapsed().as_secs_f64());
    drop(permit);
}
