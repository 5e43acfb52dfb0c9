//! Credential verifiers.
//!
//! [`IdentityVerifier`] is the seam between the gate and whatever issues
//! session credentials. [`JwtVerifier`] is the built-in implementation for
//! signed JWTs (HMAC shared secret or PEM public key).

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use logrelay_settings::JwtSettings;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{AuthError, VerifyError};

/// Principal extracted from a verified credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stable subject identifier.
    pub subject: String,
    /// Human-readable label.
    pub display_name: String,
}

/// Checks a bearer credential and returns the principal it names.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `credential`.
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies JWTs signed with a single configured key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// HMAC verifier (`HS256`, `HS384`, `HS512`).
    pub fn hmac(secret: &[u8], algorithm: Algorithm) -> Result<Self, AuthError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::Misconfigured(format!(
                "{algorithm:?} needs a public key, not a shared secret"
            )));
        }
        if secret.is_empty() {
            return Err(AuthError::Misconfigured("empty JWT secret".into()));
        }
        Ok(Self::with_key(DecodingKey::from_secret(secret), algorithm))
    }

    /// Public-key verifier from PEM bytes (RSA, RSA-PSS, EC or Ed25519).
    pub fn from_pem(pem: &[u8], algorithm: Algorithm) -> Result<Self, AuthError> {
        let key = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(AuthError::Misconfigured(format!(
                    "{algorithm:?} needs a shared secret, not a public key"
                )));
            }
        }
        .map_err(|e| AuthError::Misconfigured(format!("invalid PEM key: {e}")))?;
        Ok(Self::with_key(key, algorithm))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// Require this `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require this `aud` claim.
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Build from settings, reading the PEM file if one is configured.
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(settings.algorithm.trim()).map_err(|_| {
            AuthError::Misconfigured(format!("unknown JWT algorithm '{}'", settings.algorithm))
        })?;

        let mut verifier = match (&settings.secret, &settings.public_key_path) {
            (Some(secret), None) => Self::hmac(secret.as_bytes(), algorithm)?,
            (None, Some(path)) => Self::from_pem(&read_pem(Path::new(path))?, algorithm)?,
            (Some(_), Some(_)) => {
                return Err(AuthError::Misconfigured(
                    "configure either a secret or a public key path, not both".into(),
                ));
            }
            (None, None) => {
                return Err(AuthError::Misconfigured("no JWT key material configured".into()));
            }
        };

        if let Some(issuer) = settings.issuer.as_deref() {
            verifier = verifier.with_issuer(issuer);
        }
        if let Some(audience) = settings.audience.as_deref() {
            verifier = verifier.with_audience(audience);
        }
        Ok(verifier)
    }

    /// Decode and validate `token`.
    pub fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
                ErrorKind::InvalidIssuer => VerifyError::InvalidIssuer,
                ErrorKind::InvalidAudience => VerifyError::InvalidAudience,
                _ => VerifyError::Malformed(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(VerifyError::Malformed("empty sub claim".into()));
        }
        let display_name = claims
            .email
            .or(claims.name)
            .unwrap_or_else(|| claims.sub.clone());
        debug!(subject = %claims.sub, "token verified");
        Ok(VerifiedIdentity {
            subject: claims.sub,
            display_name,
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, VerifyError> {
        self.verify_token(credential)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, AuthError> {
    std::fs::read(path).map_err(|e| {
        AuthError::Misconfigured(format!("cannot read public key {}: {e}", path.display()))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
