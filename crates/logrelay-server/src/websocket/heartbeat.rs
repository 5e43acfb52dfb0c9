//! Pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's inbound activity.
///
/// Every `interval` the alive flag is read and cleared. A connection that has
/// shown no activity since the previous tick and none for at least `timeout`
/// is closed and `HeartbeatResult::TimedOut` is returned.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval(interval);
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.check_alive() {
                    continue;
                }
                let silent = connection.last_pong_elapsed();
                if silent >= timeout {
                    warn!(
                        conn_id = %connection.id,
                        silent_secs = silent.as_secs(),
                        "client unresponsive, closing"
                    );
                    connection.close();
                    return HeartbeatResult::TimedOut;
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logrelay_core::Identity;
    use tokio::sync::mpsc;

    fn make_connection() -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ClientConnection::new(Identity::anonymous(), tx))
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_timeout() {
        let conn = make_connection();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            conn.clone(),
            Duration::from_secs(30),
            Duration::from_secs(90),
            cancel.clone(),
        ));
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
        assert!(!conn.is_closing());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out_and_is_closed() {
        let conn = make_connection();
        let result = run_heartbeat(
            conn.clone(),
            Duration::from_secs(10),
            Duration::from_secs(30),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::TimedOut);
        assert!(conn.is_closing());
        assert!(conn.last_pong_elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn active_client_stays_open() {
        let conn = make_connection();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            conn.clone(),
            Duration::from_secs(10),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        for _ in 0..12 {
            time::sleep(Duration::from_secs(5)).await;
            conn.mark_alive();
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
        assert!(!conn.is_closing());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_resets_silence_window() {
        let conn = make_connection();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            conn.clone(),
            Duration::from_secs(10),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        time::sleep(Duration::from_secs(25)).await;
        conn.mark_alive();
        time::sleep(Duration::from_secs(25)).await;
        assert!(!conn.is_closing());

        time::sleep(Duration::from_secs(30)).await;
        assert!(conn.is_closing());
        assert_eq!(handle.await.unwrap(), HeartbeatResult::TimedOut);
        cancel.cancel();
    }
}
