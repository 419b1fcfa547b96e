//! # ragsafe-core
//!
//! Deterministic deadlock detection over a multi-instance Resource
//! Allocation Graph.
//!
//! The crate is organized as:
//! - `graph`: the Graph Store, the single source of truth
//! - `detection`: the safety algorithm that classifies the store
//! - `resolution`: advisory guidance derived from a detection result
//! - `state`: canonical JSON export/import of the whole store
//! - `history` and `session`: undoable mutations over a store
//! - `system`: read-only metrics
//!
//! ## Architectural Constraints
//!
//! - Detection is a pure function of the store and never mutates it
//! - All counts are non-negative integers; no floating point anywhere
//! - All collections are ordered so identical stores give identical results
//! - No async, no I/O, no logging: callers own the outer surfaces

// =============================================================================
// MODULES
// =============================================================================

pub mod detection;
pub mod graph;
pub mod history;
pub mod primitives;
pub mod resolution;
pub mod session;
pub mod state;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{EdgeKey, ProcessId, RagError, Resource, ResourceId};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use detection::{DeadlockDetector, DetectionResult};
pub use graph::{DetachedEdges, ResourceGraph};
pub use history::{History, Operation};
pub use resolution::{ProcessReport, ResolutionGuide, ResourceCount};
pub use session::Session;
pub use state::{
    ResourceState, StateSnapshot, export_json, import_json, parse_json, state_checksum,
};

#[cfg(feature = "crypto-hash")]
pub use state::{state_crypto_hash, verify_crypto_hash};

// =============================================================================
// RE-EXPORTS: System
// =============================================================================

pub use system::GraphMetrics;
