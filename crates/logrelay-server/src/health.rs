//! `GET /` and `GET /health` bodies.

use std::time::Instant;

use serde::Serialize;

/// `GET /` body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Always `"online"`.
    pub status: &'static str,
    /// Configured service name.
    pub service: String,
}

impl StatusResponse {
    /// Liveness body for `service`.
    pub fn online(service: impl Into<String>) -> Self {
        Self {
            status: "online",
            service: service.into(),
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered WebSocket connections.
    pub connections: usize,
    /// Non-empty deployment rooms.
    pub rooms: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, rooms: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rooms,
    }
}
