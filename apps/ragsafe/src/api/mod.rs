//! # ragsafe HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store counts and instance totals
//! - `POST /processes`, `DELETE /processes/{id}` - Add / remove a process
//! - `POST /resources`, `DELETE /resources/{id}` - Add / remove a resource
//! - `POST /requests`, `POST /requests/cancel` - Grow / shrink a request edge
//! - `POST /allocations`, `POST /allocations/release` - Grant / release instances
//! - `GET /detect` - Run the safety algorithm
//! - `GET /guide` - Resolution guidance
//! - `GET /state`, `PUT /state` - Export / import the canonical snapshot
//! - `POST /reset` - Empty the store
//! - `POST /undo`, `POST /redo` - Session history
//! - `GET /hash` - BLAKE3 hash of the canonical snapshot
//!
//! ## Security Configuration
//!
//! Each setting reads its environment variable first, then the `[server]`
//! config table.
//!
//! - `RAGSAFE_CORS_ORIGINS` / `cors_origins`: allowed origins, or "*" for all (default: localhost only)
//! - `RAGSAFE_RATE_LIMIT` / `rate_limit`: requests per second (default: 100; 0 to disable)
//! - `RAGSAFE_API_KEY` / `api_key`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, ApiKey};
pub use handlers::status_for_error;
pub use middleware::{DEFAULT_RATE_LIMIT, RATE_LIMIT_ENV, RequestLimiter};
pub use types::{
    AddProcessRequest, AddResourceRequest, DetectResponse, EdgeRequest, GuideResponse,
    HashResponse, HealthResponse, HistoryResponse, MutationResponse, StatusResponse,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use ragsafe_core::{RagError, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the session.
///
/// The lock is the single critical section around the store.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    /// State file rewritten after every successful mutation, if set.
    pub autosave: Option<Arc<PathBuf>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            autosave: None,
        }
    }

    /// Persist to `path` after each successful mutation.
    #[must_use]
    pub fn with_autosave(mut self, path: PathBuf) -> Self {
        self.autosave = Some(Arc::new(path));
        self
    }

    /// Write the session to the autosave file, if configured.
    ///
    /// Called with the write lock held. Returns `None` when autosave is off.
    /// A failed write does not undo the mutation; the caller reports it.
    pub(crate) fn persist(&self, session: &Session) -> Option<Result<(), RagError>> {
        let path = self.autosave.as_deref()?;
        let outcome = session.export_json().and_then(|data| {
            std::fs::write(path, data)
                .map_err(|e| RagError::IoError(format!("Write state '{}': {}", path.display(), e)))
        });
        if let Err(e) = &outcome {
            tracing::error!(
                event = "autosave_failed",
                path = %path.display(),
                error = %e,
                "Autosave failed"
            );
        }
        Some(outcome)
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer.
///
/// `RAGSAFE_CORS_ORIGINS` wins over the config file's `cors_origins`:
/// - "*": allows all origins (development only)
/// - not set anywhere: localhost only
/// - otherwise: the listed origins
fn build_cors_layer(config_origins: Option<&[String]>) -> CorsLayer {
    let origins: Option<Vec<String>> = std::env::var("RAGSAFE_CORS_ORIGINS")
        .ok()
        .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
        .or_else(|| config_origins.map(<[String]>::to_vec));

    match origins {
        Some(list) if list.iter().any(|o| o == "*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(list) => {
            let allowed_origins: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restrict_cors(CorsLayer::new().allow_origin(allowed_origins))
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    restrict_cors(CorsLayer::new().allow_origin(origins))
}

fn restrict_cors(layer: CorsLayer) -> CorsLayer {
    layer
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with default server settings.
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, &ServerConfig::default())
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against DoS (if enabled)
/// 5. Authentication - validates API key (if configured)
pub fn create_router_with_config(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config.cors_origins.as_deref());

    let limiter = RequestLimiter::resolve(config.rate_limit);
    match &limiter {
        Some(l) => tracing::info!("Rate limiting enabled: {} requests/second", l.rate()),
        None => tracing::info!("Rate limiting disabled"),
    }

    let api_key = ApiKey::resolve(config.api_key.as_deref());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set RAGSAFE_API_KEY or server.api_key to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/processes", post(handlers::add_process_handler))
        .route("/processes/{id}", delete(handlers::remove_process_handler))
        .route("/resources", post(handlers::add_resource_handler))
        .route("/resources/{id}", delete(handlers::remove_resource_handler))
        .route("/requests", post(handlers::add_request_handler))
        .route("/requests/cancel", post(handlers::cancel_request_handler))
        .route("/allocations", post(handlers::allocate_handler))
        .route("/allocations/release", post(handlers::release_handler))
        .route("/detect", get(handlers::detect_handler))
        .route("/guide", get(handlers::guide_handler))
        .route(
            "/state",
            get(handlers::export_state_handler).put(handlers::import_state_handler),
        )
        .route("/reset", post(handlers::reset_handler))
        .route("/undo", post(handlers::undo_handler))
        .route("/redo", post(handlers::redo_handler))
        .route("/hash", get(handlers::hash_handler));

    // Authentication is innermost so it runs after rate limiting
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(
    addr: &str,
    session: Session,
    config: &ServerConfig,
    autosave: Option<PathBuf>,
) -> Result<(), RagError> {
    let mut state = AppState::new(session);
    if let Some(path) = autosave {
        state = state.with_autosave(path);
    }
    let router = create_router_with_config(state, config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RagError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("ragsafe HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RagError::IoError(format!("Server error: {}", e)))
}

/// Resolve on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
