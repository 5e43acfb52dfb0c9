//! JSON text-frame protocol.
//!
//! Every frame is an object `{"event": <name>, "data": <payload>}`.
//!
//! | direction       | event               | data            |
//! |-----------------|---------------------|-----------------|
//! | client → relay  | `subscribe_build`   | deployment id   |
//! | client → relay  | `unsubscribe_build` | deployment id   |
//! | relay → client  | `log`               | log line text   |
//! | relay → client  | `error`             | error message   |

use std::sync::Arc;

use logrelay_core::DeploymentId;
use serde::Deserialize;
use serde_json::json;

/// Prefix of the synthetic line sent on subscribe.
pub const CONNECTED_NOTICE_PREFIX: &str = "[System] Connected to build stream for ";

/// Frames a client may send.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a deployment room.
    SubscribeBuild(DeploymentId),
    /// Leave a deployment room.
    UnsubscribeBuild(DeploymentId),
}

/// Frames the relay sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerMessage<'a> {
    /// One log line.
    Log(&'a str),
    /// Complaint about a client frame.
    Error(&'a str),
}

impl ServerMessage<'_> {
    /// Event name on the wire.
    pub fn event(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Error(_) => "error",
        }
    }

    /// Encode as a shareable text frame.
    pub fn to_frame(&self) -> Arc<String> {
        let data = match self {
            Self::Log(text) | Self::Error(text) => *text,
        };
        Arc::new(json!({ "event": self.event(), "data": data }).to_string())
    }
}

/// Synthetic line announcing a successful subscription.
pub fn connected_notice(deployment_id: &DeploymentId) -> String {
    format!("{CONNECTED_NOTICE_PREFIX}{deployment_id}")
}

/// Parse a client text frame.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid message: {e}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
