//! # Authentication Module
//!
//! Optional Bearer key for the ragsafe HTTP API.
//!
//! The key comes from `RAGSAFE_API_KEY` or, when that is unset, from
//! `api_key` in the `[server]` config table. With neither set every endpoint
//! is open. `/health` is always open.
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "RAGSAFE_API_KEY";

/// Path that never requires a key.
const OPEN_PATH: &str = "/health";

// =============================================================================
// API KEY
// =============================================================================

/// The key a server instance expects. Cheap to clone into middleware state.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// Wrap a key. Empty keys are treated as "no key".
    pub fn new(key: &str) -> Option<Self> {
        (!key.is_empty()).then(|| Self(Arc::from(key)))
    }

    /// Resolve the server key: `RAGSAFE_API_KEY` wins over the config value.
    pub fn resolve(config_key: Option<&str>) -> Option<Self> {
        Self::choose(std::env::var(API_KEY_ENV).ok(), config_key)
    }

    fn choose(env_key: Option<String>, config_key: Option<&str>) -> Option<Self> {
        env_key
            .as_deref()
            .and_then(Self::new)
            .or_else(|| config_key.and_then(Self::new))
    }

    /// Compare a presented key in constant time.
    ///
    /// Both sides are padded to the same length so the comparison always
    /// covers the same number of bytes.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        let width = expected.len().max(presented.len());
        let mut lhs = vec![0u8; width];
        let mut rhs = vec![0u8; width];
        lhs[..expected.len()].copy_from_slice(expected);
        rhs[..presented.len()].copy_from_slice(presented);

        let same_bytes: bool = lhs.ct_eq(&rhs).into();
        same_bytes && expected.len() == presented.len()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// The key after `Bearer ` in the `Authorization` header.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Reject requests that do not present the server key.
///
/// Installed only when a key was resolved, so the check itself is
/// unconditional.
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == OPEN_PATH {
        return Ok(next.run(request).await);
    }

    let reason = match presented_key(request.headers()) {
        Some(key) if expected.matches(key) => return Ok(next.run(request).await),
        Some(_) => "invalid_api_key",
        None => "missing_bearer_token",
    };

    tracing::warn!(
        event = "auth_failure",
        reason,
        path = %request.uri().path(),
        "Authentication failed"
    );
    Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
}

// =============================================================================
// TESTS
// =============================================================================
