//! Network, connection and logging settings.

use serde::{Deserialize, Serialize};

/// Listener and per-connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` asks the OS for a free port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Largest inbound WebSocket frame accepted, in bytes.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
        }
    }
}

/// Origins allowed to open a WebSocket session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginSettings {
    /// Exact origin strings. A `"*"` entry allows every origin.
    pub allowed: Vec<String>,
}

impl Default for OriginSettings {
    fn default() -> Self {
        Self {
            allowed: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "https://unideploy.in".to_string(),
                "https://www.unideploy.in".to_string(),
            ],
        }
    }
}

/// Trust settings for the internal ingestion endpoint.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestSettings {
    /// When set, producers must send this value in `x-relay-ingest-key`.
    /// When unset, the endpoint trusts its network placement.
    #[serde(skip_serializing)]
    pub shared_secret: Option<String>,
}

impl std::fmt::Debug for IngestSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestSettings")
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`..`error`). `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 3001);
        assert_eq!(s.heartbeat_interval_secs, 30);
        assert_eq!(s.heartbeat_timeout_secs, 90);
    }

    #[test]
    fn server_partial_json_fills_defaults() {
        let s: ServerSettings = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(s.port, 9000);
        assert_eq!(s.max_connections, 1024);
    }

    #[test]
    fn origin_defaults_match_known_frontends() {
        let o = OriginSettings::default();
        assert_eq!(o.allowed.len(), 4);
        assert!(o.allowed.contains(&"https://unideploy.in".to_string()));
    }

    #[test]
    fn ingest_secret_not_serialized() {
        let s = IngestSettings {
            shared_secret: Some("hunter2".into()),
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn ingest_secret_redacted_in_debug() {
        let s = IngestSettings {
            shared_secret: Some("hunter2".into()),
        };
        let debug = format!("{s:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn log_format_serde() {
        let f: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(f, LogFormat::Json);
        assert_eq!(serde_json::to_string(&LogFormat::Compact).unwrap(), "\"compact\"");
    }
}
