//! # Core Type Definitions
//!
//! This module contains all core types for the resource allocation graph:
//! - Identifiers (`ProcessId`, `ResourceId`)
//! - Resource instance accounting (`Resource`)
//! - Edge keys (`EdgeKey`)
//! - Error types (`RagError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::primitives::{EDGE_KEY_SEPARATOR, MAX_IDENTIFIER_LENGTH};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a process node.
///
/// A process carries no state of its own; it exists only as a member of the
/// store and as an endpoint of request/allocation edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub String);

impl ProcessId {
    /// Create a process identifier from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for ProcessId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of a resource node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Create a resource identifier from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Check that a caller-supplied identifier can be stored and round-tripped
/// through an encoded edge key.
pub(crate) fn check_identifier(id: &str) -> Result<(), RagError> {
    if id.trim().is_empty() {
        return Err(RagError::InvalidIdentifier(
            "identifier must not be empty".to_string(),
        ));
    }
    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RagError::InvalidIdentifier(format!(
            "identifier length {} exceeds maximum {} bytes",
            id.len(),
            MAX_IDENTIFIER_LENGTH
        )));
    }
    if id.contains(EDGE_KEY_SEPARATOR) {
        return Err(RagError::InvalidIdentifier(format!(
            "identifier '{}' contains reserved character '{}'",
            id, EDGE_KEY_SEPARATOR
        )));
    }
    Ok(())
}

// =============================================================================
// RESOURCE
// =============================================================================

/// Instance accounting for a reusable resource.
///
/// `available` is maintained by the store and always equals `total` minus
/// the sum of every allocation of this resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Number of instances the resource was created with.
    pub total: u64,
    /// Instances not currently allocated to any process.
    pub available: u64,
}

impl Resource {
    /// Create a resource with every instance available.
    #[must_use]
    pub const fn new(instances: u64) -> Self {
        Self {
            total: instances,
            available: instances,
        }
    }

    /// Instances currently held by processes.
    #[must_use]
    pub const fn held(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

// =============================================================================
// EDGE KEY
// =============================================================================

/// A (process, resource) pair keying both request and allocation edges.
///
/// Ordered by process first, then resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub process: ProcessId,
    pub resource: ResourceId,
}

impl EdgeKey {
    #[must_use]
    pub fn new(process: ProcessId, resource: ResourceId) -> Self {
        Self { process, resource }
    }

    /// Encode as `"<process>,<resource>"` for the serialized state.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.process.as_str(),
            EDGE_KEY_SEPARATOR,
            self.resource.as_str()
        )
    }

    /// Decode a key produced by [`EdgeKey::encode`].
    ///
    /// Returns `None` if the separator is missing, repeated, or either side
    /// is empty.
    #[must_use]
    pub fn decode(key: &str) -> Option<Self> {
        let (process, resource) = key.split_once(EDGE_KEY_SEPARATOR)?;
        if process.is_empty() || resource.is_empty() || resource.contains(EDGE_KEY_SEPARATOR) {
            return None;
        }
        Some(Self::new(ProcessId::new(process), ResourceId::new(resource)))
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.process, self.resource)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the ragsafe system.
///
/// - Every store mutation validates up front; an `Err` means nothing changed
/// - Detection and guide building are total and never return these
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RagError {
    /// A process or resource with this identifier already exists.
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    /// An edge operation referenced a process or resource that does not exist.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// An allocation asked for more instances than are currently available.
    #[error(
        "Insufficient instances of {resource}: requested {requested}, available {available}"
    )]
    InsufficientInstances {
        resource: ResourceId,
        requested: u64,
        available: u64,
    },

    /// An imported snapshot violates the data-model invariants.
    #[error("Malformed state: {0}")]
    MalformedState(String),

    /// A count or instance number was zero where at least one is required.
    #[error("Invalid count: {0}")]
    InvalidCount(String),

    /// An identifier cannot be stored.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The undo history is empty.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The redo history is empty.
    #[error("Nothing to redo")]
    NothingToRedo,

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
