//! # Detection Engine
//!
//! Multi-instance safety algorithm over a snapshot of the Graph Store.
//!
//! The algorithm is the reachability half of the Banker's algorithm, run on
//! current outstanding requests instead of declared maximum claims:
//!
//! ```text
//! work[r]   = available[r]
//! finish[p] = false
//! repeat until a pass finishes nobody:
//!     for each unfinished p:
//!         if request[p][r] <= work[r] for every r:
//!             work[r] += allocation[p][r] for every r
//!             finish[p] = true
//! ```
//!
//! Every process left unfinished is deadlocked. Its implicated resources are
//! the ones whose outstanding request still exceeds the *final* `work`.
//!
//! `work` only grows, so the classification and each implicated set do not
//! depend on scan order; only `passes` and `safe_sequence` may.
//! Worst case O(P² · R).

use crate::graph::ResourceGraph;
use crate::{ProcessId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DETECTION RESULT
// =============================================================================

/// Outcome of one detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Processes that cannot finish under any release ordering.
    pub deadlocked: BTreeSet<ProcessId>,

    /// Per deadlocked process, the resources it can never obtain.
    pub implicated: BTreeMap<ProcessId, BTreeSet<ResourceId>>,

    /// Order in which processes were hypothetically finished.
    ///
    /// When the system is safe this is a valid completion order. It is one
    /// witness among possibly many and must not be read as a schedule.
    pub safe_sequence: Vec<ProcessId>,

    /// Number of full scans performed before the fixed point.
    pub passes: usize,
}

impl DetectionResult {
    /// True if at least one process is deadlocked.
    #[must_use]
    pub fn is_deadlocked(&self) -> bool {
        !self.deadlocked.is_empty()
    }

    /// True if every process can finish.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.deadlocked.is_empty()
    }

    /// Deadlocked processes in identifier order.
    pub fn deadlocked_processes(&self) -> impl Iterator<Item = &ProcessId> {
        self.deadlocked.iter()
    }

    /// Implicated resources of one process (empty if it is not deadlocked).
    pub fn implicated_resources(&self, process: &ProcessId) -> impl Iterator<Item = &ResourceId> {
        self.implicated.get(process).into_iter().flatten()
    }
}

// =============================================================================
// SAFETY MATRIX (per-call projection)
// =============================================================================

/// Per-process request/allocation vectors built from a store snapshot.
///
/// Built fresh for each detection call; never cached.
struct SafetyMatrix<'a> {
    work: BTreeMap<&'a ResourceId, u64>,
    request: BTreeMap<&'a ProcessId, BTreeMap<&'a ResourceId, u64>>,
    allocation: BTreeMap<&'a ProcessId, BTreeMap<&'a ResourceId, u64>>,
}

impl<'a> SafetyMatrix<'a> {
    fn project(graph: &'a ResourceGraph) -> Self {
        let work = graph
            .resources()
            .map(|(id, accounting)| (id, accounting.available))
            .collect();

        let mut request: BTreeMap<_, BTreeMap<_, u64>> = BTreeMap::new();
        for (key, count) in graph.requests() {
            request
                .entry(&key.process)
                .or_default()
                .insert(&key.resource, count);
        }

        let mut allocation: BTreeMap<_, BTreeMap<_, u64>> = BTreeMap::new();
        for (key, count) in graph.allocations() {
            allocation
                .entry(&key.process)
                .or_default()
                .insert(&key.resource, count);
        }

        Self {
            work,
            request,
            allocation,
        }
    }

    /// Whether every outstanding request of `process` fits in `work`.
    fn can_finish(&self, process: &ProcessId) -> bool {
        self.request.get(process).is_none_or(|wants| {
            wants
                .iter()
                .all(|(resource, count)| *count <= self.work_of(resource))
        })
    }

    /// Return everything `process` holds to `work`.
    fn release_all(&mut self, process: &ProcessId) {
        if let Some(held) = self.allocation.get(process) {
            for (resource, count) in held {
                let slot = self.work.entry(*resource).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
        }
    }

    /// Resources whose outstanding request by `process` exceeds `work`.
    fn unsatisfiable(&self, process: &ProcessId) -> BTreeSet<ResourceId> {
        self.request
            .get(process)
            .into_iter()
            .flatten()
            .filter(|(resource, count)| **count > self.work_of(resource))
            .map(|(resource, _)| (*resource).clone())
            .collect()
    }

    fn work_of(&self, resource: &ResourceId) -> u64 {
        self.work.get(resource).copied().unwrap_or(0)
    }
}

// =============================================================================
// DEADLOCK DETECTOR
// =============================================================================

/// Runs the safety algorithm. Stateless: every call is a pure read.
pub struct DeadlockDetector;

impl DeadlockDetector {
    /// Classify the store as safe or deadlocked, scanning processes in
    /// identifier order.
    #[must_use]
    pub fn detect(graph: &ResourceGraph) -> DetectionResult {
        Self::run(graph, graph.processes().collect())
    }

    /// Same as [`DeadlockDetector::detect`] with an explicit scan order.
    ///
    /// Identifiers not in the store are ignored, repeats are skipped, and
    /// processes missing from `order` are scanned after the listed ones in
    /// identifier order. The classification and implicated sets equal those
    /// of [`DeadlockDetector::detect`] for any order.
    #[must_use]
    pub fn detect_in_order(graph: &ResourceGraph, order: &[ProcessId]) -> DetectionResult {
        let mut seen = BTreeSet::new();
        let mut scan: Vec<&ProcessId> = Vec::with_capacity(graph.process_count());
        for process in order {
            if graph.contains_process(process) && seen.insert(process) {
                scan.push(process);
            }
        }
        for process in graph.processes() {
            if seen.insert(process) {
                scan.push(process);
            }
        }
        Self::run(graph, scan)
    }

    fn run(graph: &ResourceGraph, scan: Vec<&ProcessId>) -> DetectionResult {
        let mut matrix = SafetyMatrix::project(graph);
        let mut finished: BTreeSet<&ProcessId> = BTreeSet::new();
        let mut safe_sequence = Vec::new();
        let mut passes = 0usize;

        loop {
            passes = passes.saturating_add(1);
            let mut progressed = false;

            for &process in &scan {
                if finished.contains(process) || !matrix.can_finish(process) {
                    continue;
                }
                matrix.release_all(process);
                finished.insert(process);
                safe_sequence.push(process.clone());
                progressed = true;
            }

            if !progressed || finished.len() == scan.len() {
                break;
            }
        }

        let mut deadlocked = BTreeSet::new();
        let mut implicated = BTreeMap::new();
        for &process in &scan {
            if finished.contains(process) {
                continue;
            }
            deadlocked.insert(process.clone());
            implicated.insert(process.clone(), matrix.unsatisfiable(process));
        }

        DetectionResult {
            deadlocked,
            implicated,
            safe_sequence,
            passes,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
