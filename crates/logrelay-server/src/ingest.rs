//! `POST /internal/logs`: accept one log line from the build pipeline.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use logrelay_core::DeploymentId;
use logrelay_settings::IngestSettings;
use metrics::counter;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::RelayError;
use crate::metrics::{INGEST_REQUESTS_TOTAL, LOG_LINES_BROADCAST_TOTAL};
use crate::server::AppState;

/// Header carrying the ingest shared secret.
pub const INGEST_KEY_HEADER: &str = "x-relay-ingest-key";

/// Body returned for any malformed ingest request.
pub const MISSING_FIELDS: &str = "Missing deploymentId or log";

/// Who may publish log lines.
#[derive(Clone, Debug)]
pub enum IngestPolicy {
    /// Any caller that can reach the endpoint.
    TrustNetwork,
    /// Callers presenting the shared secret in [`INGEST_KEY_HEADER`].
    SharedSecret(SecretString),
}

impl IngestPolicy {
    /// Resolve from settings. A blank secret means [`IngestPolicy::TrustNetwork`].
    pub fn from_settings(settings: &IngestSettings) -> Self {
        match settings.shared_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => {
                Self::SharedSecret(SecretString::from(secret.to_owned()))
            }
            _ => Self::TrustNetwork,
        }
    }

    /// Check the request headers against this policy.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), RelayError> {
        let Self::SharedSecret(expected) = self else {
            return Ok(());
        };
        let presented = headers
            .get(INGEST_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(RelayError::Unauthorized)?;
        let matches = Sha256::digest(presented.as_bytes())
            == Sha256::digest(expected.expose_secret().as_bytes());
        if matches {
            Ok(())
        } else {
            Err(RelayError::Unauthorized)
        }
    }
}

/// A validated ingest request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Target room.
    pub deployment_id: DeploymentId,
    /// Line text, forwarded unchanged.
    pub text: String,
}

/// Validate an ingest body.
///
/// `deploymentId` must be a non-empty string or a number; `log` must be a
/// non-empty string. Anything else is a [`RelayError::Validation`].
pub fn parse_log_line(body: &[u8]) -> Result<LogLine, RelayError> {
    let invalid = || RelayError::Validation(MISSING_FIELDS.into());
    let value: Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    let deployment_id = value
        .get("deploymentId")
        .and_then(DeploymentId::from_value)
        .ok_or_else(invalid)?;
    let text = match value.get("log") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        _ => return Err(invalid()),
    };
    Ok(LogLine {
        deployment_id,
        text,
    })
}

/// `POST /internal/logs`
pub async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let result = accept(&state, &headers, &body).await;
    let outcome = match &result {
        Ok(()) => "sent",
        Err(err) => err.reason(),
    };
    counter!(INGEST_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    result.map(|()| Json(json!({ "status": "sent" })))
}

async fn accept(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), RelayError> {
    if let Err(err) = state.ingest.authorize(headers) {
        warn!("ingest request without a valid key");
        return Err(err);
    }
    let line = parse_log_line(body).inspect_err(|_| debug!("rejected ingest body"))?;
    let report = state.registry.broadcast(&line.deployment_id, &line.text).await;
    counter!(LOG_LINES_BROADCAST_TOTAL).increment(1);
    debug!(
        deployment_id = %line.deployment_id,
        delivered = report.delivered,
        "ingested log line"
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(INGEST_KEY_HEADER, HeaderValue::from_str(key).unwrap());
        headers
    }

    fn assert_invalid(body: &str) {
        match parse_log_line(body.as_bytes()) {
            Err(RelayError::Validation(msg)) => assert_eq!(msg, MISSING_FIELDS),
            other => panic!("expected validation error for {body}, got {other:?}"),
        }
    }

    #[test]
    fn parses_string_id() {
        let line = parse_log_line(br#"{"deploymentId":"42","log":"Building..."}"#).unwrap();
        assert_eq!(line.deployment_id, DeploymentId::from("42"));
        assert_eq!(line.text, "Building...");
    }

    #[test]
    fn numeric_id_normalized() {
        let line = parse_log_line(br#"{"deploymentId":42,"log":"x"}"#).unwrap();
        assert_eq!(line.deployment_id, DeploymentId::from("42"));
    }

    #[test]
    fn zero_id_accepted() {
        let line = parse_log_line(br#"{"deploymentId":0,"log":"x"}"#).unwrap();
        assert_eq!(line.deployment_id.as_str(), "0");
    }

    #[test]
    fn extra_fields_ignored() {
        let line = parse_log_line(br#"{"deploymentId":"a","log":"b","level":"info"}"#).unwrap();
        assert_eq!(line.text, "b");
    }

    #[test]
    fn missing_or_empty_fields_rejected() {
        assert_invalid(r#"{"log":"x"}"#);
        assert_invalid(r#"{"deploymentId":"42"}"#);
        assert_invalid(r#"{"deploymentId":"","log":"x"}"#);
        assert_invalid(r#"{"deploymentId":null,"log":"x"}"#);
        assert_invalid(r#"{"deploymentId":"42","log":""}"#);
    }

    #[test]
    fn wrong_types_rejected() {
        assert_invalid(r#"{"deploymentId":"42","log":17}"#);
        assert_invalid(r#"{"deploymentId":["42"],"log":"x"}"#);
        assert_invalid(r#"["42","x"]"#);
        assert_invalid("not json");
        assert_invalid("");
    }

    #[test]
    fn log_text_preserved_verbatim() {
        let line = parse_log_line(br#"{"deploymentId":"1","log":"  spaced\ttext  "}"#).unwrap();
        assert_eq!(line.text, "  spaced\ttext  ");
    }

    #[test]
    fn trust_network_allows_anything() {
        let policy = IngestPolicy::from_settings(&IngestSettings::default());
        assert!(matches!(policy, IngestPolicy::TrustNetwork));
        assert!(policy.authorize(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn blank_secret_means_trust_network() {
        let settings = IngestSettings {
            shared_secret: Some("   ".into()),
        };
        assert!(matches!(IngestPolicy::from_settings(&settings), IngestPolicy::TrustNetwork));
    }

    #[test]
    fn shared_secret_checked() {
        let settings = IngestSettings {
            shared_secret: Some("s3cret".into()),
        };
        let policy = IngestPolicy::from_settings(&settings);
        assert!(policy.authorize(&headers_with_key("s3cret")).is_ok());
        assert!(matches!(
            policy.authorize(&headers_with_key("wrong")),
            Err(RelayError::Unauthorized)
        ));
        assert!(matches!(
            policy.authorize(&HeaderMap::new()),
            Err(RelayError::Unauthorized)
        ));
    }

    #[test]
    fn policy_debug_hides_secret() {
        let policy = IngestPolicy::SharedSecret(SecretString::from("s3cret".to_owned()));
        assert!(!format!("{policy:?}").contains("s3cret"));
    }
}
