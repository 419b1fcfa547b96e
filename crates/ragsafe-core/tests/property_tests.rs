//! # Property-Based Tests
//!
//! Invariants of the store and the detector over random operation sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use ragsafe_core::primitives::MAX_COUNT;
use ragsafe_core::{
    DeadlockDetector, ProcessId, ResourceGraph, ResourceId, Session, export_json, import_json,
};

/// One random store mutation, addressed by index into small fixed pools.
#[derive(Debug, Clone)]
enum Step {
    Request(usize, usize, u64),
    Allocate(usize, usize, u64),
    Release(usize, usize, u64),
    Withdraw(usize, usize, u64),
}

const PROCESSES: usize = 4;
const RESOURCES: usize = 3;

fn step() -> impl Strategy<Value = Step> {
    let idx = (0..PROCESSES, 0..RESOURCES, 1u64..4);
    prop_oneof![
        idx.clone().prop_map(|(p, r, c)| Step::Request(p, r, c)),
        idx.clone().prop_map(|(p, r, c)| Step::Allocate(p, r, c)),
        idx.clone().prop_map(|(p, r, c)| Step::Release(p, r, c)),
        idx.prop_map(|(p, r, c)| Step::Withdraw(p, r, c)),
    ]
}

fn pid(i: usize) -> ProcessId {
    ProcessId::new(format!("P{}", i + 1))
}

fn rid(i: usize) -> ResourceId {
    ResourceId::new(format!("R{}", i + 1))
}

/// Build a store from per-resource capacities and a step sequence.
/// Rejected steps are skipped.
fn build(capacities: &[u64], steps: &[Step]) -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    for _ in 0..PROCESSES {
        graph.add_process(None).expect("add process");
    }
    for &instances in capacities {
        graph.add_resource(None, instances).expect("add resource");
    }
    for step in steps {
        match *step {
            Step::Request(p, r, c) => {
                let _ = graph.add_request(&pid(p), &rid(r), c);
            }
            Step::Allocate(p, r, c) => {
                let _ = graph.add_allocation(&pid(p), &rid(r), c);
            }
            Step::Release(p, r, c) => {
                graph.remove_allocation(&pid(p), &rid(r), c);
            }
            Step::Withdraw(p, r, c) => {
                graph.remove_request(&pid(p), &rid(r), c);
            }
        }
    }
    graph
}

fn capacities() -> impl Strategy<Value = Vec<u64>> {
    vec(1u64..5, RESOURCES)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Allocations plus available always equal total.
    #[test]
    fn capacity_invariant_holds(caps in capacities(), steps in vec(step(), 0..40)) {
        let graph = build(&caps, &steps);
        for (id, resource) in graph.resources() {
            let held: u64 = graph
                .allocations()
                .filter(|(key, _)| &key.resource == id)
                .map(|(_, count)| count)
                .sum();
            prop_assert_eq!(held + resource.available, resource.total);
        }
        prop_assert!(graph.check_invariants().is_ok());
    }

    /// No edge is ever stored with a zero count.
    #[test]
    fn zero_edges_are_removed(caps in capacities(), steps in vec(step(), 0..40)) {
        let graph = build(&caps, &steps);
        prop_assert!(graph.requests().all(|(_, count)| count > 0));
        prop_assert!(graph.allocations().all(|(_, count)| count > 0));
    }

    /// A rejected allocation leaves the store unchanged.
    #[test]
    fn rejected_allocation_is_atomic(caps in capacities(), steps in vec(step(), 0..20), extra in 1u64..4) {
        let mut graph = build(&caps, &steps);
        let before = graph.clone();
        let available = graph.resource(&rid(0)).map(|r| r.available).unwrap_or(0);

        prop_assert!(graph.add_allocation(&pid(0), &rid(0), available + extra).is_err());
        prop_assert_eq!(graph, before);
    }

    /// Import(Export(s)) reproduces s.
    #[test]
    fn export_import_round_trip(caps in capacities(), steps in vec(step(), 0..40)) {
        let graph = build(&caps, &steps);
        let json = export_json(&graph).expect("export");
        let restored = import_json(&json).expect("import");
        prop_assert_eq!(restored, graph);
    }

    /// Counts at the top of the accepted range survive the round trip.
    #[test]
    fn large_counts_round_trip(
        total in (MAX_COUNT - 1_000)..=MAX_COUNT,
        held in 0u64..1_000,
        request in 1u64..=MAX_COUNT,
    ) {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add process");
        let r1 = graph.add_resource(None, total).expect("add resource");
        if held > 0 {
            graph.add_allocation(&p1, &r1, held).expect("allocate");
        }
        graph.add_request(&p1, &r1, request).expect("request");

        let json = export_json(&graph).expect("export");
        let restored = import_json(&json).expect("import");
        prop_assert_eq!(restored, graph);
    }

    /// Extra capacity never turns a safe state into a deadlocked one.
    #[test]
    fn added_capacity_preserves_safety(
        caps in capacities(),
        steps in vec(step(), 0..40),
        which in 0..RESOURCES,
        bump in 1u64..4,
    ) {
        let graph = build(&caps, &steps);
        let mut snapshot = graph.export_state();
        let state = snapshot
            .resources
            .get_mut(rid(which).as_str())
            .expect("resource exists");
        let bump = i64::try_from(bump).expect("small");
        state.total += bump;
        state.available += bump;
        let widened = snapshot.to_graph().expect("valid snapshot");

        if DeadlockDetector::detect(&graph).is_safe() {
            prop_assert!(DeadlockDetector::detect(&widened).is_safe());
        }
    }

    /// Scan order never changes the classification or implicated sets.
    #[test]
    fn detection_is_order_independent(
        caps in capacities(),
        steps in vec(step(), 0..40),
        order in Just((0..PROCESSES).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let graph = build(&caps, &steps);
        let order: Vec<ProcessId> = order.into_iter().map(pid).collect();

        let canonical = DeadlockDetector::detect(&graph);
        let shuffled = DeadlockDetector::detect_in_order(&graph, &order);
        prop_assert_eq!(canonical.deadlocked, shuffled.deadlocked);
        prop_assert_eq!(canonical.implicated, shuffled.implicated);
    }

    /// Undoing every recorded step restores the starting store.
    #[test]
    fn undo_all_restores_start(caps in capacities(), steps in vec(step(), 0..30)) {
        let start = build(&caps, &[]);
        let mut session = Session::with_graph(start.clone());
        for step in &steps {
            match *step {
                Step::Request(p, r, c) => {
                    let _ = session.add_request(&pid(p), &rid(r), c);
                }
                Step::Allocate(p, r, c) => {
                    let _ = session.add_allocation(&pid(p), &rid(r), c);
                }
                Step::Release(p, r, c) => {
                    session.remove_allocation(&pid(p), &rid(r), c);
                }
                Step::Withdraw(p, r, c) => {
                    session.remove_request(&pid(p), &rid(r), c);
                }
            }
        }
        while session.can_undo() {
            session.undo().expect("undo");
        }
        prop_assert_eq!(session.graph(), &start);
    }
}
