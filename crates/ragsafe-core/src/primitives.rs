//! # Primitives
//!
//! Hardcoded runtime constants for the ragsafe core.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Prefix for auto-generated process identifiers (`P1`, `P2`, ...).
pub const PROCESS_PREFIX: &str = "P";

/// Prefix for auto-generated resource identifiers (`R1`, `R2`, ...).
pub const RESOURCE_PREFIX: &str = "R";

/// Separator between process and resource in an encoded edge key.
///
/// Identifiers containing this character are rejected so every key decodes
/// unambiguously.
pub const EDGE_KEY_SEPARATOR: char = ',';

/// Instance count used when a resource is created without one.
pub const DEFAULT_INSTANCES: u64 = 1;

/// Count used by edge operations when the caller gives none.
pub const DEFAULT_EDGE_COUNT: u64 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Largest instance or edge count the store accepts.
///
/// The serialized state carries counts as signed 64-bit integers, so every
/// count must fit in `i64` for export and import to round-trip exactly.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Maximum length of a process or resource identifier, in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Maximum number of processes accepted by a state import.
///
/// This prevents memory exhaustion from malicious or corrupted snapshots.
pub const MAX_IMPORT_PROCESS_COUNT: usize = 100_000;

/// Maximum number of resources accepted by a state import.
pub const MAX_IMPORT_RESOURCE_COUNT: usize = 100_000;

/// Maximum number of edges (requests plus allocations) accepted by a state import.
pub const MAX_IMPORT_EDGE_COUNT: usize = 1_000_000;

/// Maximum number of undo entries a session keeps. Oldest entries are dropped.
pub const MAX_HISTORY_DEPTH: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_distinct() {
        assert_ne!(PROCESS_PREFIX, RESOURCE_PREFIX);
    }

    #[test]
    fn defaults_are_one() {
        assert_eq!(DEFAULT_INSTANCES, 1);
        assert_eq!(DEFAULT_EDGE_COUNT, 1);
    }

    #[test]
    fn max_count_fits_signed_state() {
        assert_eq!(i64::try_from(MAX_COUNT), Ok(i64::MAX));
        assert!(i64::try_from(MAX_COUNT + 1).is_err());
    }
}
