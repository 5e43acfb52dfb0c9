//! Handshake authentication gate.
//!
//! Turns the credential presented with a WebSocket upgrade into an
//! [`Identity`] or an [`AuthError`]. The decision table is driven entirely by
//! [`AuthMode`]:
//!
//! | mode              | sentinel    | other credential | none                          |
//! |-------------------|-------------|------------------|-------------------------------|
//! | Strict            | verified    | verified         | `MissingCredential`           |
//! | DevelopmentBypass | development | verified         | anonymous if no verifier      |
//! | Disabled          | development | anonymous        | anonymous                     |

use std::sync::Arc;
use std::time::Duration;

use logrelay_core::Identity;
use logrelay_settings::{AuthMode, AuthSettings};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::errors::AuthError;
use crate::verifier::{IdentityVerifier, JwtVerifier};

/// Authentication gate shared by every handshake.
pub struct AuthGate {
    mode: AuthMode,
    dev_token: SecretString,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    timeout: Duration,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("mode", &self.mode)
            .field("has_verifier", &self.verifier.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    /// Build a gate.
    ///
    /// Fails with [`AuthError::VerifierUnavailable`] when `mode` is
    /// [`AuthMode::Strict`] and no verifier is supplied.
    pub fn new(
        mode: AuthMode,
        dev_token: impl Into<String>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        if mode == AuthMode::Strict && verifier.is_none() {
            return Err(AuthError::VerifierUnavailable);
        }
        Ok(Self {
            mode,
            dev_token: SecretString::from(dev_token.into()),
            verifier,
            timeout,
        })
    }

    /// Build a gate from settings, constructing a [`JwtVerifier`] when
    /// `auth.jwt` is present.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let verifier = match &settings.jwt {
            Some(jwt) => {
                let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::from_settings(jwt)?);
                Some(verifier)
            }
            None => None,
        };
        Self::new(
            settings.mode,
            settings.dev_token.clone(),
            verifier,
            Duration::from_millis(settings.verify_timeout_ms),
        )
    }

    /// Configured mode.
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Whether a verifier is configured.
    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    /// Decide on a handshake credential. Empty strings count as absent.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let credential = credential.filter(|c| !c.is_empty());

        match self.mode {
            AuthMode::Disabled => Ok(match credential {
                Some(c) if self.is_sentinel(c) => Identity::development(),
                _ => Identity::anonymous(),
            }),
            AuthMode::DevelopmentBypass => match credential {
                Some(c) if self.is_sentinel(c) => {
                    debug!("development credential accepted");
                    Ok(Identity::development())
                }
                Some(c) => self.verify(c).await,
                None if self.verifier.is_none() => Ok(Identity::anonymous()),
                None => Err(AuthError::MissingCredential),
            },
            AuthMode::Strict => match credential {
                Some(c) => self.verify(c).await,
                None => Err(AuthError::MissingCredential),
            },
        }
    }

    fn is_sentinel(&self, credential: &str) -> bool {
        credential == self.dev_token.expose_secret()
    }

    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let Some(verifier) = &self.verifier else {
            return Err(AuthError::VerifierUnavailable);
        };
        match tokio::time::timeout(self.timeout, verifier.verify(credential)).await {
            Ok(Ok(verified)) => Ok(Identity::verified(verified.subject, verified.display_name)),
            Ok(Err(e)) => Err(AuthError::Rejected(e)),
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "identity verification timed out");
                Err(AuthError::Timeout(self.timeout))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
