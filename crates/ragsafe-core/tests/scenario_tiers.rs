//! # Scenario Tier Tests (T0-T3)
//!
//! If ANY tier fails, the detector is INVALID.
//!
//! ## Tiers
//! - T0: Store Integrity
//! - T1: Detection Classification
//! - T2: State Exchange
//! - T3: Resolution and History

use ragsafe_core::{
    DeadlockDetector, ProcessId, RagError, ResolutionGuide, ResourceGraph, ResourceId, Session,
    export_json, import_json, parse_json,
};
use std::collections::BTreeSet;

fn p(id: &str) -> ProcessId {
    ProcessId::new(id)
}

fn r(id: &str) -> ResourceId {
    ResourceId::new(id)
}

/// P1 holds R1 and wants R2; P2 holds R2 and wants R1.
fn two_cycle() -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    graph.add_process(Some("P1")).expect("add");
    graph.add_process(Some("P2")).expect("add");
    graph.add_resource(Some("R1"), 1).expect("add");
    graph.add_resource(Some("R2"), 1).expect("add");
    graph.add_allocation(&p("P1"), &r("R1"), 1).expect("allocate");
    graph.add_allocation(&p("P2"), &r("R2"), 1).expect("allocate");
    graph.add_request(&p("P1"), &r("R2"), 1).expect("request");
    graph.add_request(&p("P2"), &r("R1"), 1).expect("request");
    graph
}

// =============================================================================
// TIER T0: STORE INTEGRITY
// =============================================================================

mod t0_store_integrity {
    use super::*;

    /// T0.1: Auto-named resources fill the lowest gap.
    #[test]
    fn auto_names_reuse_lowest_unused() {
        let mut graph = ResourceGraph::new();
        let names: Vec<ResourceId> = (0..3)
            .map(|_| graph.add_resource(None, 1).expect("add"))
            .collect();
        assert_eq!(names, vec![r("R1"), r("R2"), r("R3")]);

        graph.remove_resource(&r("R2")).expect("remove");
        assert_eq!(graph.add_resource(None, 1).expect("add"), r("R2"));
    }

    /// T0.2: Over-allocation fails and leaves the store unchanged.
    #[test]
    fn over_allocation_rejected_atomically() {
        let mut graph = ResourceGraph::new();
        graph.add_process(Some("P1")).expect("add");
        graph.add_resource(Some("R1"), 1).expect("add");
        let before = export_json(&graph).expect("export");

        let result = graph.add_allocation(&p("P1"), &r("R1"), 2);
        assert_eq!(
            result,
            Err(RagError::InsufficientInstances {
                resource: r("R1"),
                requested: 2,
                available: 1,
            })
        );
        assert_eq!(export_json(&graph).expect("export"), before);
    }

    /// T0.3: Duplicate ids are rejected across both name spaces.
    #[test]
    fn duplicate_ids_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add_process(Some("X")).expect("add");
        assert!(matches!(
            graph.add_process(Some("X")),
            Err(RagError::DuplicateEntity(_))
        ));
        assert!(matches!(
            graph.add_resource(Some("X"), 1),
            Err(RagError::DuplicateEntity(_))
        ));
    }

    /// T0.4: Edges to unknown endpoints are rejected.
    #[test]
    fn unknown_endpoints_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add_process(Some("P1")).expect("add");
        assert!(matches!(
            graph.add_request(&p("P1"), &r("R9"), 1),
            Err(RagError::UnknownEntity(_))
        ));
        assert!(matches!(
            graph.add_allocation(&p("P9"), &r("R9"), 1),
            Err(RagError::UnknownEntity(_))
        ));
    }

    /// T0.5: Releasing the last instance removes the edge entirely.
    #[test]
    fn released_edge_disappears() {
        let mut graph = two_cycle();
        assert_eq!(graph.remove_allocation(&p("P1"), &r("R1"), 1), 1);
        assert_eq!(graph.allocation(&p("P1"), &r("R1")), 0);
        assert_eq!(graph.allocation_edge_count(), 1);
        assert!(graph.check_invariants().is_ok());
    }
}

// =============================================================================
// TIER T1: DETECTION CLASSIFICATION
// =============================================================================

mod t1_detection {
    use super::*;

    /// T1.1: A lone process with an idle resource is safe.
    #[test]
    fn idle_system_is_safe() {
        let mut graph = ResourceGraph::new();
        graph.add_process(None).expect("add");
        graph.add_resource(None, 1).expect("add");

        let result = DeadlockDetector::detect(&graph);
        assert!(result.is_safe());
        assert!(result.deadlocked.is_empty());
    }

    /// T1.2: The classic two-process cycle deadlocks both sides.
    #[test]
    fn two_cycle_deadlocks_both() {
        let result = DeadlockDetector::detect(&two_cycle());

        assert!(result.is_deadlocked());
        assert_eq!(result.deadlocked, BTreeSet::from([p("P1"), p("P2")]));
        assert_eq!(
            result.implicated.get(&p("P1")),
            Some(&BTreeSet::from([r("R2")]))
        );
        assert_eq!(
            result.implicated.get(&p("P2")),
            Some(&BTreeSet::from([r("R1")]))
        );
    }

    /// T1.3: Releasing a held instance breaks the cycle.
    #[test]
    fn release_breaks_cycle() {
        let mut graph = two_cycle();
        // P2 does not hold R1, so this release is a no-op.
        assert_eq!(graph.remove_allocation(&p("P2"), &r("R1"), 1), 0);
        assert!(DeadlockDetector::detect(&graph).is_deadlocked());

        assert_eq!(graph.remove_allocation(&p("P2"), &r("R2"), 1), 1);
        let result = DeadlockDetector::detect(&graph);
        assert!(result.is_safe());
        assert_eq!(result.safe_sequence, vec![p("P1"), p("P2")]);
    }

    /// T1.4: A process blocked behind the cycle is deadlocked too.
    #[test]
    fn waiter_behind_cycle_is_deadlocked() {
        let mut graph = two_cycle();
        graph.add_process(Some("P3")).expect("add");
        graph.add_request(&p("P3"), &r("R1"), 1).expect("request");

        let result = DeadlockDetector::detect(&graph);
        assert!(result.deadlocked.contains(&p("P3")));
    }

    /// T1.5: Multi-instance resources resolve what single instances cannot.
    #[test]
    fn spare_instance_keeps_system_safe() {
        let mut graph = two_cycle();
        graph.add_resource(Some("R3"), 2).expect("add");
        graph.add_allocation(&p("P1"), &r("R3"), 1).expect("allocate");
        graph.add_request(&p("P2"), &r("R3"), 1).expect("request");
        assert!(DeadlockDetector::detect(&graph).is_deadlocked());

        let mut safe = ResourceGraph::new();
        safe.add_process(Some("P1")).expect("add");
        safe.add_process(Some("P2")).expect("add");
        safe.add_resource(Some("R1"), 2).expect("add");
        safe.add_allocation(&p("P1"), &r("R1"), 1).expect("allocate");
        safe.add_request(&p("P2"), &r("R1"), 1).expect("request");
        safe.add_request(&p("P1"), &r("R1"), 1).expect("request");
        // One spare instance lets P1 or P2 finish first, then the other.
        assert!(DeadlockDetector::detect(&safe).is_safe());
    }

    /// T1.6: The empty store is trivially safe.
    #[test]
    fn empty_store_is_safe() {
        let result = DeadlockDetector::detect(&ResourceGraph::new());
        assert!(result.is_safe());
        assert!(result.safe_sequence.is_empty());
    }
}

// =============================================================================
// TIER T2: STATE EXCHANGE
// =============================================================================

mod t2_state_exchange {
    use super::*;

    /// T2.1: Export then import reproduces the store.
    #[test]
    fn round_trip_preserves_store() {
        let graph = two_cycle();
        let json = export_json(&graph).expect("export");
        let restored = import_json(&json).expect("import");
        assert_eq!(restored, graph);
    }

    /// T2.2: Over-allocated snapshots are rejected and the store is kept.
    #[test]
    fn over_allocated_snapshot_rejected() {
        let mut graph = two_cycle();
        let before = graph.clone();
        let json = r#"{
            "processes": ["P1", "P2"],
            "resources": { "R1": { "total": 1, "available": 0 } },
            "allocations": { "P1,R1": 1, "P2,R1": 1 },
            "requests": {}
        }"#;

        let snapshot = parse_json(json).expect("parse");
        let result = graph.import_state(&snapshot);
        assert!(matches!(result, Err(RagError::MalformedState(_))));
        assert_eq!(graph, before);
    }

    /// T2.3: Missing fields are malformed.
    #[test]
    fn missing_field_rejected() {
        let json = r#"{ "processes": [], "resources": {}, "allocations": {} }"#;
        assert!(matches!(
            import_json(json),
            Err(RagError::MalformedState(_))
        ));
    }

    /// T2.4: Edges to unknown entities are malformed.
    #[test]
    fn dangling_edge_rejected() {
        let json = r#"{
            "processes": ["P1"],
            "resources": {},
            "allocations": {},
            "requests": { "P1,R7": 1 }
        }"#;
        assert!(matches!(
            import_json(json),
            Err(RagError::MalformedState(_))
        ));
    }

    /// T2.5: Export is byte-identical for equal stores.
    #[test]
    fn export_is_canonical() {
        let a = export_json(&two_cycle()).expect("export");
        let b = export_json(&two_cycle()).expect("export");
        assert_eq!(a, b);
    }
}

// =============================================================================
// TIER T3: RESOLUTION AND HISTORY
// =============================================================================

mod t3_resolution_and_history {
    use super::*;

    /// T3.1: The guide targets the first deadlocked process.
    #[test]
    fn guide_targets_first_deadlocked() {
        let graph = two_cycle();
        let result = DeadlockDetector::detect(&graph);
        let guide = ResolutionGuide::build(&result, &graph);

        assert_eq!(guide.release_target, Some(p("P1")));
        let text = guide.to_string();
        assert!(text.starts_with("Deadlock Resolution Guide:"));
        assert!(text.contains("- P2: Requests: R1 (1 requested), Allocations: R2 (1 allocated)"));
    }

    /// T3.2: Undo and redo walk the session back and forth.
    #[test]
    fn session_undo_redo() {
        let mut session = Session::with_graph(two_cycle());
        session.remove_allocation(&p("P2"), &r("R2"), 1);
        assert!(session.detect().is_safe());

        session.undo().expect("undo");
        assert!(session.detect().is_deadlocked());
        session.redo().expect("redo");
        assert!(session.detect().is_safe());

        assert_eq!(session.redo(), Err(RagError::NothingToRedo));
    }
}
