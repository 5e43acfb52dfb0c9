//! Auth error types.

use std::time::Duration;

/// Reasons a presented credential was refused by a verifier.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The credential's expiry has passed.
    #[error("credential expired")]
    Expired,

    /// Signature did not match the configured key.
    #[error("invalid credential signature")]
    InvalidSignature,

    /// `iss` claim did not match.
    #[error("invalid credential issuer")]
    InvalidIssuer,

    /// `aud` claim did not match.
    #[error("invalid credential audience")]
    InvalidAudience,

    /// Credential could not be decoded or is missing required claims.
    #[error("malformed credential: {0}")]
    Malformed(String),
}

/// Errors produced by the authentication gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented and the mode requires one.
    #[error("missing credential")]
    MissingCredential,

    /// The verifier refused the credential.
    #[error("credential rejected: {0}")]
    Rejected(#[from] VerifyError),

    /// A credential needs verifying but no verifier is configured.
    #[error("no identity verifier configured")]
    VerifierUnavailable,

    /// Verification did not finish within the configured bound.
    #[error("verification timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Verifier settings could not be turned into a working verifier.
    #[error("invalid verifier configuration: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Short stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::Rejected(VerifyError::Expired) => "expired",
            Self::Rejected(_) => "rejected",
            Self::VerifierUnavailable => "verifier_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Misconfigured(_) => "misconfigured",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
