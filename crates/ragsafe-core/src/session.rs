//! # Session Module
//!
//! A Graph Store paired with its volatile undo/redo history.
//!
//! - Every successful mutation records its inverse operation
//! - History is never serialized; a session loaded from JSON starts empty
//! - Detection and guide building are read-only and never touch history
//!
//! The session is single-threaded. Shared use goes through an outer lock
//! held by the caller for the duration of each call.

use crate::detection::{DeadlockDetector, DetectionResult};
use crate::graph::ResourceGraph;
use crate::history::{History, Operation};
use crate::resolution::ResolutionGuide;
use crate::state::{StateSnapshot, export_json, parse_json, state_checksum};
use crate::system::GraphMetrics;
use crate::{ProcessId, RagError, ResourceId};

/// Store plus history.
#[derive(Debug, Clone, Default)]
pub struct Session {
    graph: ResourceGraph,
    history: History,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing store with a fresh history.
    #[must_use]
    pub fn with_graph(graph: ResourceGraph) -> Self {
        Self {
            graph,
            history: History::new(),
        }
    }

    /// Load a session from a JSON state document.
    pub fn from_json(json: &str) -> Result<Self, RagError> {
        Ok(Self::with_graph(parse_json(json)?.to_graph()?))
    }

    /// Read-only access to the store.
    #[must_use]
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Read-only access to the history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Consume the session, keeping only the store.
    #[must_use]
    pub fn into_graph(self) -> ResourceGraph {
        self.graph
    }

    // =========================================================================
    // RECORDED MUTATIONS
    // =========================================================================

    pub fn add_process(&mut self, id: Option<&str>) -> Result<ProcessId, RagError> {
        let id = self.graph.add_process(id)?;
        self.history.record(Operation::RemoveProcess(id.clone()));
        Ok(id)
    }

    pub fn add_resource(&mut self, id: Option<&str>, instances: u64) -> Result<ResourceId, RagError> {
        let id = self.graph.add_resource(id, instances)?;
        self.history.record(Operation::RemoveResource(id.clone()));
        Ok(id)
    }

    pub fn add_request(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> Result<(), RagError> {
        self.perform(Operation::AddRequest {
            process: process.clone(),
            resource: resource.clone(),
            count,
        })
    }

    /// Withdraw up to `count` of a request. Returns the amount removed.
    pub fn remove_request(&mut self, process: &ProcessId, resource: &ResourceId, count: u64) -> u64 {
        let removed = self.graph.remove_request(process, resource, count);
        if removed > 0 {
            self.history.record(Operation::AddRequest {
                process: process.clone(),
                resource: resource.clone(),
                count: removed,
            });
        }
        removed
    }

    pub fn add_allocation(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> Result<(), RagError> {
        self.perform(Operation::AddAllocation {
            process: process.clone(),
            resource: resource.clone(),
            count,
        })
    }

    /// Release up to `count` held instances. Returns the amount released.
    pub fn remove_allocation(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> u64 {
        let released = self.graph.remove_allocation(process, resource, count);
        if released > 0 {
            self.history.record(Operation::AddAllocation {
                process: process.clone(),
                resource: resource.clone(),
                count: released,
            });
        }
        released
    }

    pub fn remove_process(&mut self, process: &ProcessId) -> Result<(), RagError> {
        self.perform(Operation::RemoveProcess(process.clone()))
    }

    pub fn remove_resource(&mut self, resource: &ResourceId) -> Result<(), RagError> {
        self.perform(Operation::RemoveResource(resource.clone()))
    }

    /// Replace the store with a validated snapshot.
    ///
    /// Atomic: on `Err` neither the store nor the history changes.
    pub fn import_state(&mut self, snapshot: &StateSnapshot) -> Result<(), RagError> {
        self.perform(Operation::ReplaceState(Box::new(snapshot.clone())))
    }

    /// Parse, validate and import a JSON state document.
    pub fn import_json(&mut self, json: &str) -> Result<(), RagError> {
        let snapshot = parse_json(json)?;
        self.import_state(&snapshot)
    }

    /// Empty the store. Undoable.
    pub fn reset(&mut self) {
        if self.graph == ResourceGraph::default() {
            return;
        }
        let before = self.graph.export_state();
        self.graph.reset();
        self.history.record(Operation::ReplaceState(Box::new(before)));
    }

    fn perform(&mut self, operation: Operation) -> Result<(), RagError> {
        if let Some(inverse) = operation.apply(&mut self.graph)? {
            self.history.record(inverse);
        }
        Ok(())
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Undo the latest recorded mutation. Returns the operation replayed.
    pub fn undo(&mut self) -> Result<Operation, RagError> {
        self.history.undo(&mut self.graph)
    }

    /// Redo the latest undone mutation. Returns the operation replayed.
    pub fn redo(&mut self) -> Result<Operation, RagError> {
        self.history.redo(&mut self.graph)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // =========================================================================
    // READ-ONLY QUERIES
    // =========================================================================

    #[must_use]
    pub fn detect(&self) -> DetectionResult {
        DeadlockDetector::detect(&self.graph)
    }

    #[must_use]
    pub fn detect_in_order(&self, order: &[ProcessId]) -> DetectionResult {
        DeadlockDetector::detect_in_order(&self.graph, order)
    }

    /// Build a guide from a result previously computed on this session.
    #[must_use]
    pub fn resolution_guide(&self, result: &DetectionResult) -> ResolutionGuide {
        ResolutionGuide::build(result, &self.graph)
    }

    /// Detect and build the guide in one call.
    #[must_use]
    pub fn analyze(&self) -> (DetectionResult, ResolutionGuide) {
        let result = self.detect();
        let guide = self.resolution_guide(&result);
        (result, guide)
    }

    #[must_use]
    pub fn export_state(&self) -> StateSnapshot {
        self.graph.export_state()
    }

    pub fn export_json(&self) -> Result<String, RagError> {
        export_json(&self.graph)
    }

    #[must_use]
    pub fn checksum(&self) -> u64 {
        state_checksum(&self.graph)
    }

    #[must_use]
    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics::from_graph(&self.graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================
