//! Deployment rooms and log fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use logrelay_core::{ConnectionId, DeploymentId};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, Delivery};
use super::protocol::{ServerMessage, connected_notice};
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Outcome of one [`SubscriptionRegistry::broadcast`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members of the room at broadcast time.
    pub recipients: usize,
    /// Members whose queue accepted the line.
    pub delivered: usize,
    /// Members whose queue refused the line.
    pub dropped: usize,
    /// Members removed from every room because of this broadcast.
    pub evicted: Vec<ConnectionId>,
}

#[derive(Default)]
struct State {
    rooms: HashMap<DeploymentId, HashMap<ConnectionId, Arc<ClientConnection>>>,
    memberships: HashMap<ConnectionId, HashSet<DeploymentId>>,
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
}

impl State {
    fn leave_all(&mut self, conn_id: &ConnectionId) -> usize {
        let Some(deployments) = self.memberships.remove(conn_id) else {
            return 0;
        };
        let count = deployments.len();
        for deployment_id in deployments {
            if let Some(room) = self.rooms.get_mut(&deployment_id) {
                let _ = room.remove(conn_id);
                if room.is_empty() {
                    let _ = self.rooms.remove(&deployment_id);
                }
            }
        }
        count
    }
}

/// Live connections and the deployment rooms they have joined.
///
/// One lock guards rooms, the reverse membership index and the connection
/// table. Membership changes take it for writing; broadcasts enqueue every
/// delivery under the read lock.
pub struct SubscriptionRegistry {
    state: RwLock<State>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Track a newly accepted connection.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        let mut state = self.state.write().await;
        let _ = state.connections.insert(connection.id.clone(), connection);
    }

    /// Forget a connection, leaving every room it joined.
    pub async fn deregister(&self, conn_id: &ConnectionId) {
        let mut state = self.state.write().await;
        let rooms = state.leave_all(conn_id);
        let _ = state.connections.remove(conn_id);
        debug!(conn_id = %conn_id, rooms, "connection deregistered");
    }

    /// Join `deployment_id`'s room and send the connected notice to this
    /// connection only. Joining twice keeps a single membership.
    pub async fn subscribe(&self, connection: &Arc<ClientConnection>, deployment_id: DeploymentId) {
        let mut state = self.state.write().await;
        let _ = state
            .rooms
            .entry(deployment_id.clone())
            .or_default()
            .insert(connection.id.clone(), Arc::clone(connection));
        let _ = state
            .memberships
            .entry(connection.id.clone())
            .or_default()
            .insert(deployment_id.clone());

        info!(
            conn_id = %connection.id,
            subject = %connection.identity.subject,
            deployment_id = %deployment_id,
            "client subscribed to build"
        );

        let notice = connected_notice(&deployment_id);
        if connection.send(ServerMessage::Log(&notice).to_frame()) != Delivery::Queued {
            warn!(conn_id = %connection.id, "failed to enqueue subscribe notice");
        }
    }

    /// Leave one room. Unknown pairs are ignored.
    pub async fn unsubscribe(&self, conn_id: &ConnectionId, deployment_id: &DeploymentId) {
        let mut state = self.state.write().await;
        let mut left = false;
        if let Some(room) = state.rooms.get_mut(deployment_id) {
            left = room.remove(conn_id).is_some();
            if room.is_empty() {
                let _ = state.rooms.remove(deployment_id);
            }
        }
        if let Some(set) = state.memberships.get_mut(conn_id) {
            let _ = set.remove(deployment_id);
            if set.is_empty() {
                let _ = state.memberships.remove(conn_id);
            }
        }
        if left {
            info!(conn_id = %conn_id, deployment_id = %deployment_id, "client unsubscribed from build");
        }
    }

    /// Leave every room. Returns how many rooms were left.
    pub async fn unsubscribe_all(&self, conn_id: &ConnectionId) -> usize {
        self.state.write().await.leave_all(conn_id)
    }

    /// Deliver `text` as a log line to every member of `deployment_id`.
    ///
    /// A member whose queue refuses the line, full or closed, is removed from
    /// every room and closed. A subscriber never stays joined with a gap.
    pub async fn broadcast(&self, deployment_id: &DeploymentId, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        {
            let state = self.state.read().await;
            let Some(room) = state.rooms.get(deployment_id) else {
                return report;
            };
            let frame = ServerMessage::Log(text).to_frame();
            report.recipients = room.len();
            for conn in room.values() {
                match conn.send(Arc::clone(&frame)) {
                    Delivery::Queued => report.delivered += 1,
                    Delivery::Full | Delivery::Closed => {
                        report.dropped += 1;
                        dead.push(Arc::clone(conn));
                    }
                }
            }
        }

        if report.dropped > 0 {
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(report.dropped as u64);
        }

        if !dead.is_empty() {
            let mut state = self.state.write().await;
            for conn in dead {
                let _ = state.leave_all(&conn.id);
                conn.close();
                warn!(
                    conn_id = %conn.id,
                    deployment_id = %deployment_id,
                    dropped = conn.drop_count(),
                    "evicting unresponsive subscriber"
                );
                report.evicted.push(conn.id.clone());
            }
        }

        debug!(
            deployment_id = %deployment_id,
            recipients = report.recipients,
            delivered = report.delivered,
            "broadcast log line"
        );
        report
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    /// Connection IDs in `deployment_id`'s room.
    pub async fn members(&self, deployment_id: &DeploymentId) -> Vec<ConnectionId> {
        self.state
            .read()
            .await
            .rooms
            .get(deployment_id)
            .map(|room| room.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Deployments `conn_id` is subscribed to.
    pub async fn subscriptions(&self, conn_id: &ConnectionId) -> Vec<DeploymentId> {
        let mut ids: Vec<DeploymentId> = self
            .state
            .read()
            .await
            .memberships
            .get(conn_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
