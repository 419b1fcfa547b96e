//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use ragsafe_core::{
    DetectionResult, GraphMetrics, ProcessId, RagError, ResolutionGuide, ResourceId,
    primitives::{DEFAULT_EDGE_COUNT, DEFAULT_INSTANCES},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub process_count: usize,
    pub resource_count: usize,
    pub request_edge_count: usize,
    pub allocation_edge_count: usize,
    pub total_instances: u64,
    pub available_instances: u64,
    pub held_instances: u64,
    pub utilization_percent: u64,
    pub can_undo: bool,
    pub can_redo: bool,
    pub checksum: u64,
}

impl StatusResponse {
    pub fn new(metrics: GraphMetrics, can_undo: bool, can_redo: bool, checksum: u64) -> Self {
        Self {
            process_count: metrics.process_count,
            resource_count: metrics.resource_count,
            request_edge_count: metrics.request_edge_count,
            allocation_edge_count: metrics.allocation_edge_count,
            total_instances: metrics.total_instances,
            available_instances: metrics.available_instances,
            held_instances: metrics.held_instances,
            utilization_percent: metrics.utilization_percent,
            can_undo,
            can_redo,
            checksum,
        }
    }
}

// =============================================================================
// NODE REQUESTS
// =============================================================================

fn default_instances() -> u64 {
    DEFAULT_INSTANCES
}

fn default_count() -> u64 {
    DEFAULT_EDGE_COUNT
}

/// Add-process request. Omit `id` for an auto-generated name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddProcessRequest {
    #[serde(default)]
    pub id: Option<String>,
}

/// Add-resource request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddResourceRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_instances")]
    pub instances: u64,
}

// =============================================================================
// EDGE REQUEST
// =============================================================================

/// A (process, resource, count) triple used by every edge endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeRequest {
    pub process: String,
    pub resource: String,
    #[serde(default = "default_count")]
    pub count: u64,
}

impl EdgeRequest {
    /// Split into typed identifiers and count.
    pub fn into_parts(self) -> (ProcessId, ResourceId, u64) {
        (
            ProcessId::new(self.process),
            ResourceId::new(self.resource),
            self.count,
        )
    }
}

// =============================================================================
// MUTATION RESPONSE
// =============================================================================

/// Generic mutation response.
///
/// `id` is set when a node was created, `count` when an edge changed.
/// `persisted` is present only when the server autosaves: `false` means the
/// store changed but the state file was not written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted: Option<bool>,
    pub error: Option<String>,
}

impl MutationResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            id: None,
            count: None,
            persisted: None,
            error: None,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::success()
        }
    }

    pub fn with_count(count: u64) -> Self {
        Self {
            count: Some(count),
            ..Self::success()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            count: None,
            persisted: None,
            error: Some(msg.into()),
        }
    }

    /// Record the autosave outcome of an applied mutation.
    pub fn with_persisted(mut self, outcome: Result<(), &RagError>) -> Self {
        self.persisted = Some(outcome.is_ok());
        if let Err(e) = outcome {
            self.error = Some(format!("Change applied but not saved: {}", e));
        }
        self
    }
}

impl From<&RagError> for MutationResponse {
    fn from(e: &RagError) -> Self {
        Self::error(e.to_string())
    }
}

// =============================================================================
// DETECTION RESPONSE
// =============================================================================

/// Detection result in API form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub deadlocked: bool,
    pub processes: Vec<String>,
    pub implicated: BTreeMap<String, Vec<String>>,
    pub safe_sequence: Vec<String>,
    pub passes: usize,
}

impl From<&DetectionResult> for DetectResponse {
    fn from(result: &DetectionResult) -> Self {
        Self {
            deadlocked: result.is_deadlocked(),
            processes: result
                .deadlocked_processes()
                .map(|p| p.as_str().to_string())
                .collect(),
            implicated: result
                .implicated
                .iter()
                .map(|(p, resources)| {
                    (
                        p.as_str().to_string(),
                        resources.iter().map(|r| r.as_str().to_string()).collect(),
                    )
                })
                .collect(),
            safe_sequence: result
                .safe_sequence
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            passes: result.passes,
        }
    }
}

// =============================================================================
// GUIDE RESPONSE
// =============================================================================

/// Resolution guide, both structured and rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideResponse {
    pub safe: bool,
    pub text: String,
    pub guide: ResolutionGuide,
}

impl From<ResolutionGuide> for GuideResponse {
    fn from(guide: ResolutionGuide) -> Self {
        Self {
            safe: guide.is_safe(),
            text: guide.to_string(),
            guide,
        }
    }
}

// =============================================================================
// HISTORY RESPONSE
// =============================================================================

/// Undo/redo response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    /// Description of the operation that was replayed.
    pub operation: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Autosave outcome, as in [`MutationResponse`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted: Option<bool>,
    pub error: Option<String>,
}

impl HistoryResponse {
    pub fn success(operation: impl Into<String>, can_undo: bool, can_redo: bool) -> Self {
        Self {
            success: true,
            operation: Some(operation.into()),
            can_undo,
            can_redo,
            persisted: None,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>, can_undo: bool, can_redo: bool) -> Self {
        Self {
            success: false,
            operation: None,
            can_undo,
            can_redo,
            persisted: None,
            error: Some(msg.into()),
        }
    }

    /// Record the autosave outcome of a replayed operation.
    pub fn with_persisted(mut self, outcome: Result<(), &RagError>) -> Self {
        self.persisted = Some(outcome.is_ok());
        if let Err(e) = outcome {
            self.error = Some(format!("Change applied but not saved: {}", e));
        }
        self
    }
}

// =============================================================================
// HASH RESPONSE
// =============================================================================

/// Cryptographic hash response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub success: bool,
    pub hash: Option<String>,
    pub algorithm: String,
    pub checksum: u64,
    pub error: Option<String>,
}

impl HashResponse {
    pub fn success(hash: String, checksum: u64) -> Self {
        Self {
            success: true,
            hash: Some(hash),
            algorithm: "blake3".to_string(),
            checksum,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            hash: None,
            algorithm: "blake3".to_string(),
            checksum: 0,
            error: Some(msg.into()),
        }
    }
}
