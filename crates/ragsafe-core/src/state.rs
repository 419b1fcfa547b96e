//! # Serialized State
//!
//! Deterministic export/import of the whole Graph Store.
//!
//! The snapshot is a JSON document with exactly four fields:
//!
//! ```text
//! {
//!   "processes":   ["P1", "P2"],
//!   "resources":   { "R1": { "total": 1, "available": 0 } },
//!   "allocations": { "P1,R1": 1 },
//!   "requests":    { "P2,R1": 1 }
//! }
//! ```
//!
//! Edge keys encode the (process, resource) pair as `"<process>,<resource>"`.
//! Export is canonical: processes are sorted and every map is ordered by key,
//! so equal stores always produce byte-identical documents.
//!
//! Import never trusts its input. Anything that violates the data-model
//! invariants is rejected with `RagError::MalformedState`; nothing is
//! silently normalized. A key repeated inside one object is rejected too,
//! instead of letting the last occurrence win.

use crate::graph::ResourceGraph;
use crate::primitives::{
    MAX_IMPORT_EDGE_COUNT, MAX_IMPORT_PROCESS_COUNT, MAX_IMPORT_RESOURCE_COUNT,
};
use crate::types::check_identifier;
use crate::{EdgeKey, ProcessId, RagError, Resource, ResourceId};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Instance accounting of one resource in a snapshot.
///
/// Signed so that negative values in foreign input are reported as malformed
/// state instead of a parse error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResourceState {
    pub total: i64,
    pub available: i64,
}

/// The serialized form of a [`ResourceGraph`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StateSnapshot {
    /// Process identifiers (sorted on export; order insignificant on import).
    pub processes: Vec<String>,

    /// Resource identifier -> accounting.
    #[serde(deserialize_with = "unique_keys")]
    pub resources: BTreeMap<String, ResourceState>,

    /// Encoded edge key -> held instances.
    #[serde(deserialize_with = "unique_keys")]
    pub allocations: BTreeMap<String, i64>,

    /// Encoded edge key -> outstanding requested instances.
    #[serde(deserialize_with = "unique_keys")]
    pub requests: BTreeMap<String, i64>,
}

impl StateSnapshot {
    /// Capture a store.
    #[must_use]
    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let processes = graph.processes().map(|p| p.as_str().to_string()).collect();

        let resources = graph
            .resources()
            .map(|(id, accounting)| {
                (
                    id.as_str().to_string(),
                    ResourceState {
                        total: saturating_i64(accounting.total),
                        available: saturating_i64(accounting.available),
                    },
                )
            })
            .collect();

        let allocations = graph
            .allocations()
            .map(|(key, count)| (key.encode(), saturating_i64(count)))
            .collect();

        let requests = graph
            .requests()
            .map(|(key, count)| (key.encode(), saturating_i64(count)))
            .collect();

        Self {
            processes,
            resources,
            allocations,
            requests,
        }
    }

    /// Rebuild a validated store from this snapshot.
    pub fn to_graph(&self) -> Result<ResourceGraph, RagError> {
        ResourceGraph::try_from(self)
    }

    /// Compute a deterministic checksum of the snapshot.
    ///
    /// XOR/rotate hashing: no floating point, no randomness.
    ///
    /// # Security Note
    ///
    /// This is **NOT** a cryptographic hash. It detects accidental
    /// corruption and gives a quick equality check between two states.
    /// Enable the `crypto-hash` feature for a BLAKE3 digest.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hash: u64 = 0;

        let mut processes: Vec<&String> = self.processes.iter().collect();
        processes.sort();
        for process in processes {
            hash ^= bytes_hash(process.as_bytes()).rotate_left(13);
        }

        for (id, state) in &self.resources {
            hash ^= bytes_hash(id.as_bytes()).rotate_left(7);
            hash ^= (state.total as u64).rotate_left(17);
            hash ^= (state.available as u64).rotate_left(11);
        }

        for (key, count) in &self.allocations {
            hash ^= bytes_hash(key.as_bytes()).rotate_left(19);
            hash ^= (*count as u64).rotate_left(5);
        }

        for (key, count) in &self.requests {
            hash ^= bytes_hash(key.as_bytes()).rotate_left(23);
            hash ^= (*count as u64).rotate_left(29);
        }

        hash
    }

    fn check_limits(&self) -> Result<(), RagError> {
        if self.processes.len() > MAX_IMPORT_PROCESS_COUNT {
            return Err(RagError::MalformedState(format!(
                "process count {} exceeds maximum allowed {}",
                self.processes.len(),
                MAX_IMPORT_PROCESS_COUNT
            )));
        }
        if self.resources.len() > MAX_IMPORT_RESOURCE_COUNT {
            return Err(RagError::MalformedState(format!(
                "resource count {} exceeds maximum allowed {}",
                self.resources.len(),
                MAX_IMPORT_RESOURCE_COUNT
            )));
        }
        let edges = self.allocations.len().saturating_add(self.requests.len());
        if edges > MAX_IMPORT_EDGE_COUNT {
            return Err(RagError::MalformedState(format!(
                "edge count {} exceeds maximum allowed {}",
                edges, MAX_IMPORT_EDGE_COUNT
            )));
        }
        Ok(())
    }
}

impl TryFrom<&StateSnapshot> for ResourceGraph {
    type Error = RagError;

    fn try_from(snapshot: &StateSnapshot) -> Result<Self, Self::Error> {
        snapshot.check_limits()?;

        let mut processes = BTreeSet::new();
        for id in &snapshot.processes {
            check_identifier(id).map_err(|e| RagError::MalformedState(e.to_string()))?;
            if !processes.insert(ProcessId::new(id.as_str())) {
                return Err(RagError::MalformedState(format!(
                    "process {} listed more than once",
                    id
                )));
            }
        }

        let mut resources = BTreeMap::new();
        for (id, state) in &snapshot.resources {
            check_identifier(id).map_err(|e| RagError::MalformedState(e.to_string()))?;
            let total = non_negative(state.total, || format!("total of resource {}", id))?;
            let available =
                non_negative(state.available, || format!("available of resource {}", id))?;
            resources.insert(ResourceId::new(id.as_str()), Resource { total, available });
        }

        let requests = decode_edges(&snapshot.requests, "request")?;
        let allocations = decode_edges(&snapshot.allocations, "allocation")?;

        let graph = ResourceGraph::from_parts(processes, resources, requests, allocations);
        graph.check_invariants()?;
        Ok(graph)
    }
}

// =============================================================================
// STORE-LEVEL EXPORT / IMPORT
// =============================================================================

impl ResourceGraph {
    /// Capture the whole store as a snapshot.
    #[must_use]
    pub fn export_state(&self) -> StateSnapshot {
        StateSnapshot::from_graph(self)
    }

    /// Replace the whole store with a snapshot's contents.
    ///
    /// Atomic: on `Err` the store is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `MalformedState` if the snapshot violates any invariant.
    pub fn import_state(&mut self, snapshot: &StateSnapshot) -> Result<(), RagError> {
        let replacement = ResourceGraph::try_from(snapshot)?;
        *self = replacement;
        Ok(())
    }
}

/// Export a store as a pretty-printed JSON document.
pub fn export_json(graph: &ResourceGraph) -> Result<String, RagError> {
    serde_json::to_string_pretty(&graph.export_state())
        .map_err(|e| RagError::SerializationError(e.to_string()))
}

/// Parse a JSON document into a snapshot without validating invariants.
///
/// # Errors
///
/// Returns `MalformedState` on invalid JSON, missing or unknown fields, or
/// non-integer counts.
pub fn parse_json(json: &str) -> Result<StateSnapshot, RagError> {
    serde_json::from_str(json).map_err(|e| RagError::MalformedState(e.to_string()))
}

/// Parse and validate a JSON document into a new store.
pub fn import_json(json: &str) -> Result<ResourceGraph, RagError> {
    parse_json(json)?.to_graph()
}

/// Compute the canonical checksum of a store.
#[must_use]
pub fn state_checksum(graph: &ResourceGraph) -> u64 {
    graph.export_state().checksum()
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// Compute a BLAKE3 hash of the canonical JSON export, as a hex string.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn state_crypto_hash(graph: &ResourceGraph) -> Result<String, RagError> {
    let data = export_json(graph)?;
    Ok(blake3::hash(data.as_bytes()).to_hex().to_string())
}

/// Verify a store against a BLAKE3 hash of its canonical export.
#[cfg(feature = "crypto-hash")]
pub fn verify_crypto_hash(graph: &ResourceGraph, expected_hash: &str) -> bool {
    state_crypto_hash(graph).is_ok_and(|actual| actual == expected_hash)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Deserialize a JSON object into a map, failing on a repeated key.
fn unique_keys<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueKeys<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeys<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format!("duplicate key '{}'", key)));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueKeys(PhantomData))
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn non_negative(value: i64, what: impl FnOnce() -> String) -> Result<u64, RagError> {
    u64::try_from(value)
        .map_err(|_| RagError::MalformedState(format!("{} is negative ({})", what(), value)))
}

fn decode_edges(
    edges: &BTreeMap<String, i64>,
    kind: &str,
) -> Result<BTreeMap<EdgeKey, u64>, RagError> {
    let mut decoded = BTreeMap::new();
    for (raw_key, count) in edges {
        let key = EdgeKey::decode(raw_key).ok_or_else(|| {
            RagError::MalformedState(format!("undecodable {} key '{}'", kind, raw_key))
        })?;
        let count = non_negative(*count, || format!("{} {}", kind, key))?;
        if count == 0 {
            return Err(RagError::MalformedState(format!(
                "{} {} has a zero count",
                kind, key
            )));
        }
        decoded.insert(key, count);
    }
    Ok(decoded)
}

/// FNV-1a over raw bytes, folded into the XOR checksum.
fn bytes_hash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// =============================================================================
// TESTS
// =============================================================================
