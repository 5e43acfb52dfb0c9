//! Per-socket connection state shared between the session task and the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use logrelay_core::{ConnectionId, Identity};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of enqueueing one outbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Frame is queued for the writer.
    Queued,
    /// Queue was full; the frame was dropped.
    Full,
    /// Writer has gone away.
    Closed,
}

/// One accepted WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Principal established at handshake.
    pub identity: Identity,
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    close: CancellationToken,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("subject", &self.identity.subject)
            .field("dropped", &self.drop_count())
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Create a connection with a fresh ID.
    pub fn new(identity: Identity, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self::with_id(ConnectionId::new(), identity, tx)
    }

    /// Create a connection with an explicit ID.
    pub fn with_id(id: ConnectionId, identity: Identity, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            close: CancellationToken::new(),
        }
    }

    /// Enqueue a frame without waiting. Failed attempts count as drops.
    pub fn send(&self, frame: Arc<String>) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(err) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                match err {
                    TrySendError::Full(_) => Delivery::Full,
                    TrySendError::Closed(_) => Delivery::Closed,
                }
            }
        }
    }

    /// Lifetime count of frames that could not be queued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity (pong or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Read and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Ask every task serving this connection to stop.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closing(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Resolves once the connection is asked to close.
    pub async fn closed(&self) {
        self.close.cancelled().await;
    }

    /// Child token cancelled together with this connection.
    pub fn close_token(&self) -> CancellationToken {
        self.close.child_token()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(Identity::anonymous(), tx), rx)
    }

    #[tokio::test]
    async fn send_queues_in_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..3 {
            assert_eq!(conn.send(Arc::new(format!("line {i}"))), Delivery::Queued);
        }
        for i in 0..3 {
            assert_eq!(*rx.recv().await.unwrap(), format!("line {i}"));
        }
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn full_queue_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.send(Arc::new("a".into())), Delivery::Queued);
        assert_eq!(conn.send(Arc::new("b".into())), Delivery::Full);
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_detected() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert_eq!(conn.send(Arc::new("a".into())), Delivery::Closed);
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn ids_are_prefixed_and_unique() {
        let (a, _ra) = make_connection(1);
        let (b, _rb) = make_connection(1);
        assert!(a.id.as_str().starts_with("conn_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn alive_flag_swaps() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn last_pong_tracks_activity() {
        let (conn, _rx) = make_connection(1);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(conn.last_pong_elapsed() >= Duration::from_secs(10));
        conn.mark_alive();
        assert!(conn.last_pong_elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn close_resolves_waiters() {
        let (conn, _rx) = make_connection(1);
        let conn = Arc::new(conn);
        let token = conn.close_token();
        assert!(!conn.is_closing());
        conn.close();
        assert!(conn.is_closing());
        token.cancelled().await;
        conn.closed().await;
    }

    #[test]
    fn debug_shows_subject() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(Identity::development(), tx);
        assert!(format!("{conn:?}").contains("mock-user-123"));
    }
}
