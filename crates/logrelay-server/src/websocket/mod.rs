//! WebSocket handshake, connection lifecycle, heartbeat and room fan-out.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod upgrade;
