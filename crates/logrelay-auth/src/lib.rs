//! # logrelay-auth
//!
//! Handshake authentication for the log relay.
//!
//! - [`AuthGate`] decides, per upgrade request, whether a credential yields an
//!   [`Identity`](logrelay_core::Identity) under the configured mode.
//! - [`IdentityVerifier`] is the pluggable credential check; [`JwtVerifier`]
//!   is the built-in implementation.

#![deny(unsafe_code)]

pub mod errors;
pub mod gate;
pub mod verifier;

pub use errors::{AuthError, VerifyError};
pub use gate::AuthGate;
pub use verifier::{IdentityVerifier, JwtVerifier, VerifiedIdentity};
