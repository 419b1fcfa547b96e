//! # Middleware Module
//!
//! Global request throttling for the ragsafe HTTP API.
//!
//! The rate comes from `RAGSAFE_RATE_LIMIT`, then `rate_limit` in the
//! `[server]` config table, then [`DEFAULT_RATE_LIMIT`]. A rate of `0`
//! turns throttling off. Rejected requests get `429` with `Retry-After`.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding the configured rate.
pub const RATE_LIMIT_ENV: &str = "RAGSAFE_RATE_LIMIT";

/// Requests per second when neither environment nor config sets a rate.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// =============================================================================
// REQUEST LIMITER
// =============================================================================

/// One token bucket shared by every route.
#[derive(Clone)]
pub struct RequestLimiter {
    bucket: Arc<DirectLimiter>,
    rate: NonZeroU32,
}

impl RequestLimiter {
    /// Limiter admitting `rate` requests per second.
    pub fn per_second(rate: NonZeroU32) -> Self {
        Self {
            bucket: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
            rate,
        }
    }

    /// Build the server limiter, or `None` when throttling is off.
    ///
    /// An unparsable `RAGSAFE_RATE_LIMIT` is ignored.
    pub fn resolve(config_rate: Option<u32>) -> Option<Self> {
        let env_rate = std::env::var(RATE_LIMIT_ENV)
            .ok()
            .and_then(|s| s.trim().parse().ok());
        Self::choose(env_rate, config_rate)
    }

    fn choose(env_rate: Option<u32>, config_rate: Option<u32>) -> Option<Self> {
        let rate = env_rate.or(config_rate).unwrap_or(DEFAULT_RATE_LIMIT);
        NonZeroU32::new(rate).map(Self::per_second)
    }

    /// Requests per second.
    pub fn rate(&self) -> u32 {
        self.rate.get()
    }

    /// Take one token, or report how long until the next one.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.bucket
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

/// Whole seconds to wait, rounded up and never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Reject requests over the global rate with `429 Too Many Requests`.
pub async fn rate_limit_middleware(
    State(limiter): State<RequestLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.try_acquire() {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after = retry_after_secs(wait);
            tracing::warn!(
                event = "rate_limited",
                rate = limiter.rate(),
                retry_after,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                "Too Many Requests",
            )
                .into_response()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
