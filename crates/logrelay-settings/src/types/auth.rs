//! Handshake authentication settings.

use serde::{Deserialize, Serialize};

/// How the relay treats credentials at handshake time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// Every connection needs a credential accepted by the verifier.
    #[default]
    Strict,
    /// The development sentinel credential is honored, and a missing
    /// credential is admitted anonymously when no verifier is configured.
    DevelopmentBypass,
    /// No verification at all. Every connection is admitted.
    Disabled,
}

impl AuthMode {
    /// Parse a mode name as used in env vars (`strict`, `development-bypass`, `disabled`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "strict" => Some(Self::Strict),
            "developmentbypass" | "dev" | "development" => Some(Self::DevelopmentBypass),
            "disabled" | "off" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::DevelopmentBypass => f.write_str("development-bypass"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// JWT verifier configuration.
///
/// Exactly one of `secret` (HMAC algorithms) or `public_key_path`
/// (RSA / EC algorithms, PEM encoded) is expected.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtSettings {
    /// Signing algorithm name, e.g. `HS256` or `RS256`.
    pub algorithm: String,
    /// Shared HMAC secret.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Path to a PEM public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<String>,
    /// Required `iss` claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Required `aud` claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            secret: None,
            public_key_path: None,
            issuer: None,
            audience: None,
        }
    }
}

impl JwtSettings {
    /// Whether any key material is present.
    pub fn has_key_material(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty()) || self.public_key_path.is_some()
    }
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("public_key_path", &self.public_key_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// Authentication gate settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Gate mode.
    pub mode: AuthMode,
    /// Reserved development sentinel credential.
    pub dev_token: String,
    /// Upper bound on a single verification call, in milliseconds.
    pub verify_timeout_ms: u64,
    /// Verifier configuration. `None` means no verifier is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtSettings>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mode: AuthMode::Strict,
            dev_token: "mock-token".to_string(),
            verify_timeout_ms: 5_000,
            jwt: None,
        }
    }
}
