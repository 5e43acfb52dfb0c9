//! Browser origin allow-list.

use std::collections::HashSet;

use axum::http::{HeaderMap, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::errors::RelayError;

/// The request's `Origin` header. Empty or non-UTF-8 values count as absent.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| !origin.is_empty())
}

/// Which origins may open a real-time session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Every origin is accepted.
    AllowAll,
    /// Only these exact origin strings are accepted.
    AllowList(HashSet<String>),
}

impl OriginPolicy {
    /// Build a policy from configured origin strings.
    ///
    /// A `"*"` entry anywhere yields [`OriginPolicy::AllowAll`]. Entries are
    /// trimmed; blanks are skipped.
    pub fn from_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for origin in origins {
            let origin = origin.as_ref().trim();
            if origin == "*" {
                return Self::AllowAll;
            }
            if !origin.is_empty() {
                let _ = allowed.insert(origin.to_owned());
            }
        }
        Self::AllowList(allowed)
    }

    /// Whether `origin` passes. Requests without an `Origin` header, or with
    /// an empty one, pass.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin.filter(|o| !o.is_empty())) {
            (Self::AllowAll, _) | (_, None) => true,
            (Self::AllowList(allowed), Some(origin)) => allowed.contains(origin),
        }
    }

    /// Check `origin`, logging and returning [`RelayError::OriginDenied`] on refusal.
    pub fn check(&self, origin: Option<&str>) -> Result<(), RelayError> {
        if self.allows(origin) {
            return Ok(());
        }
        let origin = origin.unwrap_or_default().to_owned();
        warn!(origin = %origin, "blocked connection from unauthorized origin");
        Err(RelayError::OriginDenied { origin })
    }

    /// CORS layer for the HTTP routes, mirroring this policy.
    pub fn cors_layer(&self) -> CorsLayer {
        let allow_origin = match self {
            Self::AllowAll => AllowOrigin::from(Any),
            Self::AllowList(allowed) => {
                let mut values: Vec<HeaderValue> = allowed
                    .iter()
                    .filter_map(|o| HeaderValue::from_str(o).ok())
                    .collect();
                values.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
                AllowOrigin::list(values)
            }
        };
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
