//! Principal attached to an accepted connection.

use serde::{Deserialize, Serialize};

/// Subject assigned when the development sentinel credential is presented.
pub const DEV_SUBJECT: &str = "mock-user-123";
/// Display name assigned with [`DEV_SUBJECT`].
pub const DEV_DISPLAY_NAME: &str = "local-dev@unideploy.in";
/// Subject assigned when a connection is admitted without verification.
pub const ANONYMOUS_SUBJECT: &str = "anonymous";
/// Display name assigned with [`ANONYMOUS_SUBJECT`].
pub const ANONYMOUS_DISPLAY_NAME: &str = "mock@local";

/// How an identity was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Credential checked by the configured verifier.
    Verified,
    /// Development sentinel credential.
    Development,
    /// Admitted without any credential check.
    Anonymous,
}

/// Authenticated principal of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable subject identifier (e.g. the `sub` claim).
    pub subject: String,
    /// Human-readable label, usually an email address.
    pub display_name: String,
    /// How this identity was established.
    pub source: IdentitySource,
}

impl Identity {
    /// Identity returned by a successful verification.
    pub fn verified(subject: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            source: IdentitySource::Verified,
        }
    }

    /// Fixed local-development identity.
    pub fn development() -> Self {
        Self {
            subject: DEV_SUBJECT.to_owned(),
            display_name: DEV_DISPLAY_NAME.to_owned(),
            source: IdentitySource::Development,
        }
    }

    /// Fallback identity for connections admitted without verification.
    pub fn anonymous() -> Self {
        Self {
            subject: ANONYMOUS_SUBJECT.to_owned(),
            display_name: ANONYMOUS_DISPLAY_NAME.to_owned(),
            source: IdentitySource::Anonymous,
        }
    }

    /// Whether the identity came from a real credential check.
    pub fn is_verified(&self) -> bool {
        self.source == IdentitySource::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_identity_is_fixed() {
        let id = Identity::development();
        assert_eq!(id.subject, "mock-user-123");
        assert_eq!(id.display_name, "local-dev@unideploy.in");
        assert_eq!(id.source, IdentitySource::Development);
        assert!(!id.is_verified());
    }

    #[test]
    fn anonymous_identity_label() {
        let id = Identity::anonymous();
        assert_eq!(id.display_name, "mock@local");
        assert_eq!(id.source, IdentitySource::Anonymous);
    }

    #[test]
    fn verified_identity() {
        let id = Identity::verified("uid-1", "dev@example.com");
        assert!(id.is_verified());
        assert_eq!(id.subject, "uid-1");
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Identity::development()).unwrap();
        assert_eq!(json["displayName"], "local-dev@unideploy.in");
        assert_eq!(json["source"], "development");
    }
}
