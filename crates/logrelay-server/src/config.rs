//! Runtime server configuration.

use std::time::Duration;

use logrelay_settings::RelaySettings;

/// Resolved listener and connection limits.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Service name reported by `GET /`.
    pub service_name: String,
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Close a connection after this long without a pong.
    pub heartbeat_timeout: Duration,
    /// Largest inbound WebSocket message in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
}

impl ServerConfig {
    /// Resolve from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let server = &settings.server;
        Self {
            service_name: settings.name.clone(),
            host: server.host.clone(),
            port: server.port,
            max_connections: server.max_connections,
            heartbeat_interval: Duration::from_secs(server.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(server.heartbeat_timeout_secs),
            max_message_size: server.max_message_size,
            send_queue_capacity: server.send_queue_capacity,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    /// Loopback on an OS-assigned port, otherwise the settings defaults.
    fn default() -> Self {
        let mut config = Self::from_settings(&RelaySettings::default());
        config.host = "127.0.0.1".into();
        config.port = 0;
        config
    }
}
