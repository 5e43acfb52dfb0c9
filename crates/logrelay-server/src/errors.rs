//! Request-level errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logrelay_auth::AuthError;
use serde_json::json;

/// Errors that terminate a handshake or an ingest call.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request's `Origin` is not on the allow-list.
    #[error("origin not allowed: {origin}")]
    OriginDenied {
        /// Offending origin.
        origin: String,
    },

    /// The handshake credential was missing or refused.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthError),

    /// The request body failed validation.
    #[error("{0}")]
    Validation(String),

    /// The connection limit has been reached.
    #[error("connection limit reached ({limit})")]
    CapacityExceeded {
        /// Configured limit.
        limit: usize,
    },

    /// Ingest request without the expected shared secret.
    #[error("unauthorized")]
    Unauthorized,
}

impl RelayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::OriginDenied { .. } => StatusCode::FORBIDDEN,
            Self::AuthenticationFailed(_) | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::CapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::OriginDenied { .. } => "origin",
            Self::AuthenticationFailed(e) => e.reason(),
            Self::Validation(_) => "validation",
            Self::CapacityExceeded { .. } => "capacity",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            RelayError::OriginDenied { origin: "x".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RelayError::from(AuthError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RelayError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::CapacityExceeded { limit: 3 }.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(RelayError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validation_body_is_message_verbatim() {
        let resp = RelayError::Validation("Missing deploymentId or log".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"error": "Missing deploymentId or log"}));
    }

    #[tokio::test]
    async fn auth_failure_body() {
        let resp = RelayError::from(AuthError::MissingCredential).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "authentication failed: missing credential");
    }

    #[test]
    fn reasons() {
        assert_eq!(RelayError::OriginDenied { origin: "x".into() }.reason(), "origin");
        assert_eq!(RelayError::from(AuthError::VerifierUnavailable).reason(), "verifier_unavailable");
        assert_eq!(RelayError::CapacityExceeded { limit: 1 }.reason(), "capacity");
    }
}
