//! # logrelay-server
//!
//! Axum HTTP + `WebSocket` relay that fans build log lines out to browsers.
//!
//! - `GET /ws`: origin check, handshake authentication, capacity, upgrade
//! - Subscription registry: deployment rooms with ordered, non-blocking fan-out
//! - `POST /internal/logs`: ingestion from the build pipeline
//! - Health, Prometheus metrics and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod origin;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::RelayError;
pub use ingest::IngestPolicy;
pub use origin::OriginPolicy;
pub use server::{AppState, RelayServer};
pub use websocket::registry::{BroadcastReport, SubscriptionRegistry};
