//! # Operation History
//!
//! Command-pattern undo/redo over the Graph Store.
//!
//! Each history entry is an engine [`Operation`] that, when applied through
//! the store's public API, reverses (or re-applies) one earlier mutation.
//! Replays go through the same validation as any caller, so history can
//! never bypass the store's invariants.
//!
//! History is volatile: it is never serialized and holds no presentation
//! state.

use crate::graph::{DetachedEdges, ResourceGraph};
use crate::primitives::MAX_HISTORY_DEPTH;
use crate::state::StateSnapshot;
use crate::{ProcessId, RagError, ResourceId};
use std::collections::VecDeque;

// =============================================================================
// OPERATION
// =============================================================================

/// A replayable engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddProcess(ProcessId),
    RemoveProcess(ProcessId),
    AddResource { id: ResourceId, instances: u64 },
    RemoveResource(ResourceId),
    AddRequest {
        process: ProcessId,
        resource: ResourceId,
        count: u64,
    },
    RemoveRequest {
        process: ProcessId,
        resource: ResourceId,
        count: u64,
    },
    AddAllocation {
        process: ProcessId,
        resource: ResourceId,
        count: u64,
    },
    RemoveAllocation {
        process: ProcessId,
        resource: ResourceId,
        count: u64,
    },
    /// Replace the whole store (import, reset, or inverse of a lossy removal).
    ReplaceState(Box<StateSnapshot>),
}

impl Operation {
    /// Apply to `graph` and return the operation that undoes it.
    ///
    /// Returns `Ok(None)` when the operation changed nothing (a removal of
    /// an absent edge). On `Err` the store is unchanged.
    pub fn apply(&self, graph: &mut ResourceGraph) -> Result<Option<Operation>, RagError> {
        match self {
            Operation::AddProcess(id) => {
                let id = graph.add_process(Some(id.as_str()))?;
                Ok(Some(Operation::RemoveProcess(id)))
            }
            Operation::RemoveProcess(id) => {
                let before = graph.export_state();
                let detached = graph.remove_process(id)?;
                Ok(Some(inverse_of_removal(
                    detached,
                    before,
                    Operation::AddProcess(id.clone()),
                )))
            }
            Operation::AddResource { id, instances } => {
                let id = graph.add_resource(Some(id.as_str()), *instances)?;
                Ok(Some(Operation::RemoveResource(id)))
            }
            Operation::RemoveResource(id) => {
                let before = graph.export_state();
                let (accounting, detached) = graph.remove_resource(id)?;
                Ok(Some(inverse_of_removal(
                    detached,
                    before,
                    Operation::AddResource {
                        id: id.clone(),
                        instances: accounting.total,
                    },
                )))
            }
            Operation::AddRequest {
                process,
                resource,
                count,
            } => {
                graph.add_request(process, resource, *count)?;
                Ok(Some(Operation::RemoveRequest {
                    process: process.clone(),
                    resource: resource.clone(),
                    count: *count,
                }))
            }
            Operation::RemoveRequest {
                process,
                resource,
                count,
            } => {
                let removed = graph.remove_request(process, resource, *count);
                Ok((removed > 0).then(|| Operation::AddRequest {
                    process: process.clone(),
                    resource: resource.clone(),
                    count: removed,
                }))
            }
            Operation::AddAllocation {
                process,
                resource,
                count,
            } => {
                graph.add_allocation(process, resource, *count)?;
                Ok(Some(Operation::RemoveAllocation {
                    process: process.clone(),
                    resource: resource.clone(),
                    count: *count,
                }))
            }
            Operation::RemoveAllocation {
                process,
                resource,
                count,
            } => {
                let released = graph.remove_allocation(process, resource, *count);
                Ok((released > 0).then(|| Operation::AddAllocation {
                    process: process.clone(),
                    resource: resource.clone(),
                    count: released,
                }))
            }
            Operation::ReplaceState(snapshot) => {
                let before = graph.export_state();
                graph.import_state(snapshot)?;
                Ok(Some(Operation::ReplaceState(Box::new(before))))
            }
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Operation::AddProcess(id) => format!("add process {}", id),
            Operation::RemoveProcess(id) => format!("remove process {}", id),
            Operation::AddResource { id, instances } => {
                format!("add resource {} ({} instances)", id, instances)
            }
            Operation::RemoveResource(id) => format!("remove resource {}", id),
            Operation::AddRequest {
                process,
                resource,
                count,
            } => format!("{} requests {} x{}", process, resource, count),
            Operation::RemoveRequest {
                process,
                resource,
                count,
            } => format!("{} withdraws request {} x{}", process, resource, count),
            Operation::AddAllocation {
                process,
                resource,
                count,
            } => format!("allocate {} x{} to {}", resource, count, process),
            Operation::RemoveAllocation {
                process,
                resource,
                count,
            } => format!("release {} x{} from {}", resource, count, process),
            Operation::ReplaceState(_) => "replace state".to_string(),
        }
    }
}

/// A removal that dropped no edges is undone by re-adding the node;
/// otherwise the whole prior state is restored.
fn inverse_of_removal(
    detached: DetachedEdges,
    before: StateSnapshot,
    re_add: Operation,
) -> Operation {
    if detached.is_empty() {
        re_add
    } else {
        Operation::ReplaceState(Box::new(before))
    }
}

// =============================================================================
// HISTORY
// =============================================================================

/// Bounded undo/redo stacks of inverse operations.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo: VecDeque<Operation>,
    redo: Vec<Operation>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inverse of a mutation that just succeeded.
    ///
    /// Clears the redo stack. Drops the oldest entry past
    /// `MAX_HISTORY_DEPTH`.
    pub fn record(&mut self, inverse: Operation) {
        self.redo.clear();
        self.undo.push_back(inverse);
        self.trim();
    }

    /// Undo the most recent mutation.
    ///
    /// On `Err` both the stacks and the store are unchanged.
    pub fn undo(&mut self, graph: &mut ResourceGraph) -> Result<Operation, RagError> {
        let inverse = self.undo.pop_back().ok_or(RagError::NothingToUndo)?;
        match inverse.apply(graph) {
            Ok(redo) => {
                if let Some(redo) = redo {
                    self.redo.push(redo);
                }
                Ok(inverse)
            }
            Err(e) => {
                self.undo.push_back(inverse);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone mutation.
    pub fn redo(&mut self, graph: &mut ResourceGraph) -> Result<Operation, RagError> {
        let operation = self.redo.pop().ok_or(RagError::NothingToRedo)?;
        match operation.apply(graph) {
            Ok(inverse) => {
                if let Some(inverse) = inverse {
                    self.undo.push_back(inverse);
                    self.trim();
                }
                Ok(operation)
            }
            Err(e) => {
                self.redo.push(operation);
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    fn trim(&mut self) {
        while self.undo.len() > MAX_HISTORY_DEPTH {
            self.undo.pop_front();
        }
    }

    /// Forget all entries.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
