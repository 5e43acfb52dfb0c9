//! # logrelay-core
//!
//! Shared vocabulary for the log relay crates:
//!
//! - **Branded IDs**: [`ConnectionId`] newtype generated per live socket
//! - **Deployment keys**: [`DeploymentId`], the caller-supplied room key
//! - **Identity**: [`Identity`] attached to every accepted connection

#![deny(unsafe_code)]

pub mod identity;
pub mod ids;

pub use identity::{Identity, IdentitySource};
pub use ids::{ConnectionId, DeploymentId};
