//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Mutations hold the session write lock for their whole duration; reads
//! and detection hold the read lock, so every detection run observes a
//! consistent store.

use super::{
    AppState,
    types::{
        AddProcessRequest, AddResourceRequest, DetectResponse, EdgeRequest, GuideResponse,
        HashResponse, HealthResponse, HistoryResponse, MutationResponse, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use ragsafe_core::{Operation, ProcessId, RagError, ResourceId, Session, state_crypto_hash};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a core error.
pub fn status_for_error(e: &RagError) -> StatusCode {
    match e {
        RagError::DuplicateEntity(_) | RagError::NothingToUndo | RagError::NothingToRedo => {
            StatusCode::CONFLICT
        }
        RagError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        RagError::InsufficientInstances { .. }
        | RagError::InvalidCount(_)
        | RagError::InvalidIdentifier(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RagError::MalformedState(_) => StatusCode::BAD_REQUEST,
        RagError::SerializationError(_) | RagError::IoError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn mutation_error(e: &RagError) -> (StatusCode, Json<MutationResponse>) {
    tracing::warn!(event = "mutation_rejected", error = %e, "Mutation rejected");
    (status_for_error(e), Json(MutationResponse::from(e)))
}

/// Autosave an applied mutation and fold the outcome into the reply.
///
/// A failed write answers 500 with `persisted: false`: the store changed
/// but the state file is behind it.
fn saved(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    response: MutationResponse,
) -> (StatusCode, Json<MutationResponse>) {
    match state.persist(session) {
        None => (status, Json(response)),
        Some(Ok(())) => (status, Json(response.with_persisted(Ok(())))),
        Some(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(response.with_persisted(Err(&e))),
        ),
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get store status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let response = StatusResponse::new(
        session.metrics(),
        session.can_undo(),
        session.can_redo(),
        session.checksum(),
    );

    (StatusCode::OK, Json(response))
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

/// Add a process.
pub async fn add_process_handler(
    State(state): State<AppState>,
    Json(request): Json<AddProcessRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.add_process(request.id.as_deref()) {
        Ok(id) => {
            tracing::info!(event = "process_added", process = %id, "Process added");
            saved(&state, &session, StatusCode::CREATED, MutationResponse::with_id(id.0))
        }
        Err(e) => mutation_error(&e),
    }
}

/// Remove a process, releasing its allocations.
pub async fn remove_process_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let process = ProcessId::new(id);
    match session.remove_process(&process) {
        Ok(()) => {
            tracing::info!(event = "process_removed", process = %process, "Process removed");
            saved(&state, &session, StatusCode::OK, MutationResponse::with_id(process.0))
        }
        Err(e) => mutation_error(&e),
    }
}

/// Add a resource.
pub async fn add_resource_handler(
    State(state): State<AppState>,
    Json(request): Json<AddResourceRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.add_resource(request.id.as_deref(), request.instances) {
        Ok(id) => {
            tracing::info!(
                event = "resource_added",
                resource = %id,
                instances = request.instances,
                "Resource added"
            );
            saved(&state, &session, StatusCode::CREATED, MutationResponse::with_id(id.0))
        }
        Err(e) => mutation_error(&e),
    }
}

/// Remove a resource and its edges.
pub async fn remove_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let resource = ResourceId::new(id);
    match session.remove_resource(&resource) {
        Ok(()) => {
            tracing::info!(event = "resource_removed", resource = %resource, "Resource removed");
            saved(&state, &session, StatusCode::OK, MutationResponse::with_id(resource.0))
        }
        Err(e) => mutation_error(&e),
    }
}

// =============================================================================
// EDGE HANDLERS
// =============================================================================

/// Add to a request edge. Responds with the new outstanding count.
pub async fn add_request_handler(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> impl IntoResponse {
    let (process, resource, count) = request.into_parts();
    let mut session = state.session.write().await;
    match session.add_request(&process, &resource, count) {
        Ok(()) => {
            tracing::info!(
                event = "request_added",
                process = %process,
                resource = %resource,
                count,
                "Request recorded"
            );
            let outstanding = session.graph().request(&process, &resource);
            saved(&state, &session, StatusCode::OK, MutationResponse::with_count(outstanding))
        }
        Err(e) => mutation_error(&e),
    }
}

/// Withdraw part of a request edge. Responds with the amount removed.
pub async fn cancel_request_handler(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> impl IntoResponse {
    let (process, resource, count) = request.into_parts();
    let mut session = state.session.write().await;
    let removed = session.remove_request(&process, &resource, count);
    if removed == 0 {
        return (StatusCode::OK, Json(MutationResponse::with_count(0)));
    }
    tracing::info!(
        event = "request_cancelled",
        process = %process,
        resource = %resource,
        removed,
        "Request withdrawn"
    );
    saved(&state, &session, StatusCode::OK, MutationResponse::with_count(removed))
}

/// Grant instances. Responds with the resource's remaining availability.
pub async fn allocate_handler(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> impl IntoResponse {
    let (process, resource, count) = request.into_parts();
    let mut session = state.session.write().await;
    match session.add_allocation(&process, &resource, count) {
        Ok(()) => {
            tracing::info!(
                event = "allocation_granted",
                process = %process,
                resource = %resource,
                count,
                "Allocation granted"
            );
            let available = session
                .graph()
                .resource(&resource)
                .map(|r| r.available)
                .unwrap_or(0);
            saved(&state, &session, StatusCode::OK, MutationResponse::with_count(available))
        }
        Err(e) => mutation_error(&e),
    }
}

/// Release held instances. Responds with the amount released.
pub async fn release_handler(
    State(state): State<AppState>,
    Json(request): Json<EdgeRequest>,
) -> impl IntoResponse {
    let (process, resource, count) = request.into_parts();
    let mut session = state.session.write().await;
    let released = session.remove_allocation(&process, &resource, count);
    if released == 0 {
        return (StatusCode::OK, Json(MutationResponse::with_count(0)));
    }
    tracing::info!(
        event = "allocation_released",
        process = %process,
        resource = %resource,
        released,
        "Allocation released"
    );
    saved(&state, &session, StatusCode::OK, MutationResponse::with_count(released))
}

// =============================================================================
// DETECTION HANDLERS
// =============================================================================

/// Run deadlock detection.
pub async fn detect_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let result = session.detect();
    tracing::info!(
        event = "detection_run",
        deadlocked = result.deadlocked.len(),
        passes = result.passes,
        "Detection complete"
    );

    (StatusCode::OK, Json(DetectResponse::from(&result)))
}

/// Detect and build the resolution guide from that same result.
pub async fn guide_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let (_, guide) = session.analyze();

    (StatusCode::OK, Json(GuideResponse::from(guide)))
}

// =============================================================================
// STATE HANDLERS
// =============================================================================

/// Export the canonical state snapshot.
pub async fn export_state_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    (StatusCode::OK, Json(session.export_state()))
}

/// Replace the store with a snapshot.
///
/// Takes the raw body so that every malformed document, including invalid
/// JSON, is reported as `MalformedState`.
pub async fn import_state_handler(
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.import_json(&body) {
        Ok(()) => {
            let metrics = session.metrics();
            tracing::info!(
                event = "state_imported",
                processes = metrics.process_count,
                resources = metrics.resource_count,
                "State imported"
            );
            saved(&state, &session, StatusCode::OK, MutationResponse::success())
        }
        Err(e) => mutation_error(&e),
    }
}

/// Empty the store. Undoable.
pub async fn reset_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.reset();
    tracing::info!(event = "state_reset", "Store reset");
    saved(&state, &session, StatusCode::OK, MutationResponse::success())
}

// =============================================================================
// HISTORY HANDLERS
// =============================================================================

/// Undo the latest mutation.
pub async fn undo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let outcome = session.undo();
    history_response(&state, &session, outcome, "undo")
}

/// Redo the latest undone mutation.
pub async fn redo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let outcome = session.redo();
    history_response(&state, &session, outcome, "redo")
}

fn history_response(
    state: &AppState,
    session: &Session,
    outcome: Result<Operation, RagError>,
    action: &'static str,
) -> (StatusCode, Json<HistoryResponse>) {
    let (can_undo, can_redo) = (session.can_undo(), session.can_redo());
    match outcome {
        Ok(operation) => {
            tracing::info!(event = action, operation = %operation.describe(), "History replayed");
            let response = HistoryResponse::success(operation.describe(), can_undo, can_redo);
            match state.persist(session) {
                None => (StatusCode::OK, Json(response)),
                Some(Ok(())) => (StatusCode::OK, Json(response.with_persisted(Ok(())))),
                Some(Err(e)) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(response.with_persisted(Err(&e))),
                ),
            }
        }
        Err(e) => (
            status_for_error(&e),
            Json(HistoryResponse::error(e.to_string(), can_undo, can_redo)),
        ),
    }
}

// =============================================================================
// HASH HANDLER
// =============================================================================

/// BLAKE3 hash of the canonical state.
pub async fn hash_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match state_crypto_hash(session.graph()) {
        Ok(hash) => (
            StatusCode::OK,
            Json(HashResponse::success(hash, session.checksum())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HashResponse::error(format!("Hash failed: {}", e))),
        ),
    }
}
