//! # Graph Store
//!
//! The resource allocation graph: processes, resources with instance counts,
//! and the two edge multisets (`requests` and `allocations`) keyed by
//! (process, resource).
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering.
//!
//! Every mutation validates its preconditions before touching any
//! collection, so a returned `Err` always means the store is unchanged.
//! After every successful mutation:
//! 1. Every edge references an existing process and resource.
//! 2. `available` is never negative.
//! 3. Allocations of a resource plus its `available` equal its `total`.
//! 4. Process and resource identifiers are unique and disjoint.
//! 5. No edge has a zero count.

use crate::primitives::{MAX_COUNT, PROCESS_PREFIX, RESOURCE_PREFIX};
use crate::types::check_identifier;
use crate::{EdgeKey, ProcessId, RagError, Resource, ResourceId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DETACHED EDGES
// =============================================================================

/// Edges taken out of the store by a node removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachedEdges {
    /// Pending requests that were dropped.
    pub requests: Vec<(EdgeKey, u64)>,
    /// Allocations that were released back to their resources.
    pub allocations: Vec<(EdgeKey, u64)>,
}

impl DetachedEdges {
    /// True when the removal touched no edge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.allocations.is_empty()
    }
}

// =============================================================================
// RESOURCE GRAPH
// =============================================================================

/// The Graph Store.
///
/// Sole owner of all processes, resources and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGraph {
    /// Process membership.
    processes: BTreeSet<ProcessId>,

    /// Resource instance accounting: ResourceId -> (total, available)
    resources: BTreeMap<ResourceId, Resource>,

    /// Outstanding requests: (process, resource) -> count
    requests: BTreeMap<EdgeKey, u64>,

    /// Held instances: (process, resource) -> count
    allocations: BTreeMap<EdgeKey, u64>,
}

impl ResourceGraph {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a store from raw collections without validation.
    ///
    /// Callers must run [`ResourceGraph::check_invariants`] before handing
    /// the result out.
    pub(crate) fn from_parts(
        processes: BTreeSet<ProcessId>,
        resources: BTreeMap<ResourceId, Resource>,
        requests: BTreeMap<EdgeKey, u64>,
        allocations: BTreeMap<EdgeKey, u64>,
    ) -> Self {
        Self {
            processes,
            resources,
            requests,
            allocations,
        }
    }

    // =========================================================================
    // NODE CREATION
    // =========================================================================

    /// Add a process.
    ///
    /// With `id == None` the lowest-numbered unused `P<n>` is generated.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if a supplied id cannot be stored
    /// - `DuplicateEntity` if the id names an existing process or resource
    pub fn add_process(&mut self, id: Option<&str>) -> Result<ProcessId, RagError> {
        let id = match id {
            Some(raw) => {
                check_identifier(raw)?;
                ProcessId::new(raw)
            }
            None => ProcessId::new(self.next_free_name(PROCESS_PREFIX)),
        };
        self.ensure_name_free(id.as_str())?;
        self.processes.insert(id.clone());
        Ok(id)
    }

    /// Add a resource with `instances` identical instances, all available.
    ///
    /// With `id == None` the lowest-numbered unused `R<n>` is generated.
    ///
    /// # Errors
    ///
    /// - `InvalidCount` if `instances` is zero or above `MAX_COUNT`
    /// - `InvalidIdentifier` if a supplied id cannot be stored
    /// - `DuplicateEntity` if the id names an existing process or resource
    pub fn add_resource(
        &mut self,
        id: Option<&str>,
        instances: u64,
    ) -> Result<ResourceId, RagError> {
        check_count(instances, "instance count")?;
        let id = match id {
            Some(raw) => {
                check_identifier(raw)?;
                ResourceId::new(raw)
            }
            None => ResourceId::new(self.next_free_name(RESOURCE_PREFIX)),
        };
        self.ensure_name_free(id.as_str())?;
        self.resources.insert(id.clone(), Resource::new(instances));
        Ok(id)
    }

    // =========================================================================
    // EDGE MUTATION
    // =========================================================================

    /// Record that `process` desires `count` more instances of `resource`.
    ///
    /// Additive: repeated calls accumulate. No capacity check, a request is
    /// a desire and not a grant.
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` if either endpoint is absent
    /// - `InvalidCount` if `count` is zero, or the accumulated request would
    ///   exceed `MAX_COUNT`
    pub fn add_request(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> Result<(), RagError> {
        self.check_endpoints(process, resource)?;
        check_count(count, "request count")?;
        let key = EdgeKey::new(process.clone(), resource.clone());
        let current = self.requests.get(&key).copied().unwrap_or(0);
        let total = accumulate(current, count, "request")?;
        self.requests.insert(key, total);
        Ok(())
    }

    /// Grant `count` instances of `resource` to `process`.
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` if either endpoint is absent
    /// - `InvalidCount` if `count` is zero or above `MAX_COUNT`
    /// - `InsufficientInstances` if `count` exceeds the available instances
    pub fn add_allocation(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> Result<(), RagError> {
        if !self.processes.contains(process) {
            return Err(unknown_process(process));
        }
        let Some(accounting) = self.resources.get_mut(resource) else {
            return Err(unknown_resource(resource));
        };
        check_count(count, "allocation count")?;
        if count > accounting.available {
            return Err(RagError::InsufficientInstances {
                resource: resource.clone(),
                requested: count,
                available: accounting.available,
            });
        }

        let key = EdgeKey::new(process.clone(), resource.clone());
        let held = self.allocations.get(&key).copied().unwrap_or(0);
        let held = accumulate(held, count, "allocation")?;
        accounting.available -= count;
        self.allocations.insert(key, held);
        Ok(())
    }

    /// Release up to `count` instances of `resource` held by `process`.
    ///
    /// Returns the number of instances actually released, which is
    /// `min(count, held)`. No-op returning 0 when no such allocation exists.
    pub fn remove_allocation(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> u64 {
        let key = EdgeKey::new(process.clone(), resource.clone());
        let released = take_from(&mut self.allocations, &key, count);
        if released > 0
            && let Some(accounting) = self.resources.get_mut(resource)
        {
            accounting.available = accounting.available.saturating_add(released);
        }
        released
    }

    /// Withdraw up to `count` of `process`'s outstanding request for `resource`.
    ///
    /// Returns the amount removed. No-op returning 0 when no such request exists.
    pub fn remove_request(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
        count: u64,
    ) -> u64 {
        let key = EdgeKey::new(process.clone(), resource.clone());
        take_from(&mut self.requests, &key, count)
    }

    // =========================================================================
    // NODE REMOVAL
    // =========================================================================

    /// Remove a process, dropping its requests and releasing its allocations.
    pub fn remove_process(&mut self, process: &ProcessId) -> Result<DetachedEdges, RagError> {
        if !self.processes.remove(process) {
            return Err(unknown_process(process));
        }

        let mut detached = DetachedEdges::default();
        self.requests.retain(|key, count| {
            if &key.process == process {
                detached.requests.push((key.clone(), *count));
                false
            } else {
                true
            }
        });
        self.allocations.retain(|key, count| {
            if &key.process == process {
                detached.allocations.push((key.clone(), *count));
                false
            } else {
                true
            }
        });

        for (key, count) in &detached.allocations {
            if let Some(accounting) = self.resources.get_mut(&key.resource) {
                accounting.available = accounting.available.saturating_add(*count);
            }
        }

        Ok(detached)
    }

    /// Remove a resource together with every edge that references it.
    ///
    /// Returns the resource's accounting at removal time and the dropped edges.
    pub fn remove_resource(
        &mut self,
        resource: &ResourceId,
    ) -> Result<(Resource, DetachedEdges), RagError> {
        let Some(accounting) = self.resources.remove(resource) else {
            return Err(unknown_resource(resource));
        };

        let mut detached = DetachedEdges::default();
        self.requests.retain(|key, count| {
            if &key.resource == resource {
                detached.requests.push((key.clone(), *count));
                false
            } else {
                true
            }
        });
        self.allocations.retain(|key, count| {
            if &key.resource == resource {
                detached.allocations.push((key.clone(), *count));
                false
            } else {
                true
            }
        });

        Ok((accounting, detached))
    }

    /// Empty the store.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    /// All processes in identifier order.
    pub fn processes(&self) -> impl Iterator<Item = &ProcessId> {
        self.processes.iter()
    }

    /// All resources in identifier order.
    pub fn resources(&self) -> impl Iterator<Item = (&ResourceId, &Resource)> {
        self.resources.iter()
    }

    /// Accounting for one resource.
    #[must_use]
    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    #[must_use]
    pub fn contains_process(&self, id: &ProcessId) -> bool {
        self.processes.contains(id)
    }

    #[must_use]
    pub fn contains_resource(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    #[must_use]
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn request_edge_count(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn allocation_edge_count(&self) -> usize {
        self.allocations.len()
    }

    /// Outstanding request count for a pair (0 when absent).
    #[must_use]
    pub fn request(&self, process: &ProcessId, resource: &ResourceId) -> u64 {
        self.requests
            .get(&EdgeKey::new(process.clone(), resource.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Held instance count for a pair (0 when absent).
    #[must_use]
    pub fn allocation(&self, process: &ProcessId, resource: &ResourceId) -> u64 {
        self.allocations
            .get(&EdgeKey::new(process.clone(), resource.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// All request edges in (process, resource) order.
    pub fn requests(&self) -> impl Iterator<Item = (&EdgeKey, u64)> + '_ {
        self.requests.iter().map(|(key, count)| (key, *count))
    }

    /// All allocation edges in (process, resource) order.
    pub fn allocations(&self) -> impl Iterator<Item = (&EdgeKey, u64)> + '_ {
        self.allocations.iter().map(|(key, count)| (key, *count))
    }

    /// Requests made by one process, in resource order.
    pub fn requests_of<'a>(
        &'a self,
        process: &'a ProcessId,
    ) -> impl Iterator<Item = (&'a ResourceId, u64)> + 'a {
        edges_of(&self.requests, process)
    }

    /// Allocations held by one process, in resource order.
    pub fn allocations_of<'a>(
        &'a self,
        process: &'a ProcessId,
    ) -> impl Iterator<Item = (&'a ResourceId, u64)> + 'a {
        edges_of(&self.allocations, process)
    }

    // =========================================================================
    // INVARIANTS
    // =========================================================================

    /// Verify every data-model invariant.
    ///
    /// Mutations through the public API cannot break these; this is the
    /// gate for assembled or imported state.
    ///
    /// # Errors
    ///
    /// Returns `MalformedState` describing the first violation found.
    pub fn check_invariants(&self) -> Result<(), RagError> {
        for process in &self.processes {
            check_identifier(process.as_str())
                .map_err(|e| RagError::MalformedState(e.to_string()))?;
            if self.resources.contains_key(process.as_str()) {
                return Err(RagError::MalformedState(format!(
                    "'{}' is both a process and a resource",
                    process
                )));
            }
        }

        let mut held: BTreeMap<&ResourceId, u64> = BTreeMap::new();
        for (edges, kind) in [(&self.requests, "request"), (&self.allocations, "allocation")] {
            for (key, count) in edges {
                if *count == 0 {
                    return Err(RagError::MalformedState(format!(
                        "{} {} has a zero count",
                        kind, key
                    )));
                }
                if !self.processes.contains(&key.process) {
                    return Err(RagError::MalformedState(format!(
                        "{} {} references unknown process {}",
                        kind, key, key.process
                    )));
                }
                if !self.resources.contains_key(&key.resource) {
                    return Err(RagError::MalformedState(format!(
                        "{} {} references unknown resource {}",
                        kind, key, key.resource
                    )));
                }
                if kind == "allocation" {
                    let sum = held.entry(&key.resource).or_insert(0);
                    *sum = sum.saturating_add(*count);
                }
            }
        }

        for (id, accounting) in &self.resources {
            check_identifier(id.as_str()).map_err(|e| RagError::MalformedState(e.to_string()))?;
            if accounting.total == 0 {
                return Err(RagError::MalformedState(format!(
                    "resource {} has no instances",
                    id
                )));
            }
            if accounting.available > accounting.total {
                return Err(RagError::MalformedState(format!(
                    "resource {} has {} available of {} total",
                    id, accounting.available, accounting.total
                )));
            }
            let allocated = held.get(id).copied().unwrap_or(0);
            if allocated.checked_add(accounting.available) != Some(accounting.total) {
                return Err(RagError::MalformedState(format!(
                    "resource {}: {} allocated + {} available != {} total",
                    id, allocated, accounting.available, accounting.total
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn name_in_use(&self, name: &str) -> bool {
        self.processes.contains(name) || self.resources.contains_key(name)
    }

    fn ensure_name_free(&self, name: &str) -> Result<(), RagError> {
        if self.processes.contains(name) {
            return Err(RagError::DuplicateEntity(format!(
                "process {} already exists",
                name
            )));
        }
        if self.resources.contains_key(name) {
            return Err(RagError::DuplicateEntity(format!(
                "resource {} already exists",
                name
            )));
        }
        Ok(())
    }

    /// Lowest-numbered `<prefix><n>` (n >= 1) not used by any node.
    fn next_free_name(&self, prefix: &str) -> String {
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{}{}", prefix, n);
            if !self.name_in_use(&candidate) {
                return candidate;
            }
            n = n.saturating_add(1);
        }
    }

    fn check_endpoints(&self, process: &ProcessId, resource: &ResourceId) -> Result<(), RagError> {
        if !self.processes.contains(process) {
            return Err(unknown_process(process));
        }
        if !self.resources.contains_key(resource) {
            return Err(unknown_resource(resource));
        }
        Ok(())
    }
}

/// Counts must be positive and fit the signed integers of the serialized state.
fn check_count(count: u64, what: &str) -> Result<(), RagError> {
    if count == 0 {
        return Err(RagError::InvalidCount(format!("{} must be at least 1", what)));
    }
    if count > MAX_COUNT {
        return Err(RagError::InvalidCount(format!(
            "{} {} exceeds maximum {}",
            what, count, MAX_COUNT
        )));
    }
    Ok(())
}

/// Grow an edge count, failing instead of wrapping or passing `MAX_COUNT`.
fn accumulate(current: u64, count: u64, kind: &str) -> Result<u64, RagError> {
    current
        .checked_add(count)
        .filter(|total| *total <= MAX_COUNT)
        .ok_or_else(|| {
            RagError::InvalidCount(format!(
                "{} of {} + {} exceeds maximum {}",
                kind, current, count, MAX_COUNT
            ))
        })
}

fn unknown_process(id: &ProcessId) -> RagError {
    RagError::UnknownEntity(format!("process {}", id))
}

fn unknown_resource(id: &ResourceId) -> RagError {
    RagError::UnknownEntity(format!("resource {}", id))
}

/// Decrease an edge by up to `count`, removing it when it reaches zero.
fn take_from(edges: &mut BTreeMap<EdgeKey, u64>, key: &EdgeKey, count: u64) -> u64 {
    let Some(current) = edges.get_mut(key) else {
        return 0;
    };
    let taken = count.min(*current);
    *current -= taken;
    if *current == 0 {
        edges.remove(key);
    }
    taken
}

fn edges_of<'a>(
    edges: &'a BTreeMap<EdgeKey, u64>,
    process: &'a ProcessId,
) -> impl Iterator<Item = (&'a ResourceId, u64)> + 'a {
    edges
        .iter()
        .filter(move |(key, _)| &key.process == process)
        .map(|(key, count)| (&key.resource, *count))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> ProcessId {
        ProcessId::new(id)
    }

    fn r(id: &str) -> ResourceId {
        ResourceId::new(id)
    }

    #[test]
    fn auto_names_are_sequential() {
        let mut graph = ResourceGraph::new();
        assert_eq!(graph.add_process(None).expect("add"), p("P1"));
        assert_eq!(graph.add_process(None).expect("add"), p("P2"));
        assert_eq!(graph.add_resource(None, 1).expect("add"), r("R1"));
    }

    #[test]
    fn auto_name_reuses_lowest_gap() {
        let mut graph = ResourceGraph::new();
        for _ in 0..3 {
            graph.add_resource(None, 1).expect("add");
        }
        graph.remove_resource(&r("R2")).expect("remove");
        assert_eq!(graph.add_resource(None, 1).expect("add"), r("R2"));
        assert_eq!(graph.add_resource(None, 1).expect("add"), r("R4"));
    }

    #[test]
    fn auto_name_skips_explicit_names() {
        let mut graph = ResourceGraph::new();
        graph.add_process(Some("P1")).expect("add");
        graph.add_process(Some("P2")).expect("add");
        assert_eq!(graph.add_process(None).expect("add"), p("P3"));
    }

    #[test]
    fn duplicate_process_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add_process(Some("worker")).expect("add");
        let err = graph.add_process(Some("worker")).expect_err("duplicate");
        assert!(matches!(err, RagError::DuplicateEntity(_)));
        assert_eq!(graph.process_count(), 1);
    }

    #[test]
    fn identifier_spaces_are_disjoint() {
        let mut graph = ResourceGraph::new();
        graph.add_resource(Some("R1"), 1).expect("add");
        let err = graph.add_process(Some("R1")).expect_err("collision");
        assert!(matches!(err, RagError::DuplicateEntity(_)));

        graph.add_process(Some("P1")).expect("add");
        let err = graph.add_resource(Some("P1"), 2).expect_err("collision");
        assert!(matches!(err, RagError::DuplicateEntity(_)));
    }

    #[test]
    fn zero_instances_rejected() {
        let mut graph = ResourceGraph::new();
        let err = graph.add_resource(None, 0).expect_err("zero");
        assert!(matches!(err, RagError::InvalidCount(_)));
        assert_eq!(graph.resource_count(), 0);
    }

    #[test]
    fn requests_accumulate() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");

        graph.add_request(&p1, &r1, 1).expect("request");
        graph.add_request(&p1, &r1, 2).expect("request");
        assert_eq!(graph.request(&p1, &r1), 3);
        assert_eq!(graph.request_edge_count(), 1);
    }

    #[test]
    fn request_needs_no_capacity() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        graph.add_request(&p1, &r1, 50).expect("request");
        assert_eq!(graph.request(&p1, &r1), 50);
    }

    #[test]
    fn edge_to_unknown_entity_rejected() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");

        assert!(matches!(
            graph.add_request(&p("ghost"), &r1, 1),
            Err(RagError::UnknownEntity(_))
        ));
        assert!(matches!(
            graph.add_allocation(&p1, &r("ghost"), 1),
            Err(RagError::UnknownEntity(_))
        ));
        assert_eq!(graph.request_edge_count(), 0);
        assert_eq!(graph.allocation_edge_count(), 0);
    }

    #[test]
    fn allocation_decrements_available() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 3).expect("add");

        graph.add_allocation(&p1, &r1, 2).expect("allocate");
        assert_eq!(graph.allocation(&p1, &r1), 2);
        assert_eq!(graph.resource(&r1).map(|x| x.available), Some(1));
    }

    #[test]
    fn over_allocation_rejected_without_change() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        let before = graph.clone();

        let err = graph.add_allocation(&p1, &r1, 2).expect_err("over");
        assert_eq!(
            err,
            RagError::InsufficientInstances {
                resource: r1.clone(),
                requested: 2,
                available: 1,
            }
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn zero_count_edges_rejected() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        assert!(matches!(
            graph.add_request(&p1, &r1, 0),
            Err(RagError::InvalidCount(_))
        ));
        assert!(matches!(
            graph.add_allocation(&p1, &r1, 0),
            Err(RagError::InvalidCount(_))
        ));
    }

    #[test]
    fn counts_above_signed_range_rejected() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        assert!(matches!(
            graph.add_resource(Some("huge"), u64::MAX),
            Err(RagError::InvalidCount(_))
        ));
        assert!(matches!(
            graph.add_resource(Some("huge"), MAX_COUNT + 1),
            Err(RagError::InvalidCount(_))
        ));
        let r1 = graph.add_resource(None, MAX_COUNT).expect("largest resource");

        assert!(matches!(
            graph.add_request(&p1, &r1, u64::MAX),
            Err(RagError::InvalidCount(_))
        ));
        assert!(matches!(
            graph.add_allocation(&p1, &r1, MAX_COUNT + 1),
            Err(RagError::InvalidCount(_))
        ));
        assert_eq!(graph.request_edge_count(), 0);
        assert_eq!(graph.allocation_edge_count(), 0);
    }

    #[test]
    fn request_accumulation_stops_at_max_count() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");

        graph.add_request(&p1, &r1, MAX_COUNT).expect("largest request");
        let before = graph.clone();
        assert!(matches!(
            graph.add_request(&p1, &r1, 1),
            Err(RagError::InvalidCount(_))
        ));
        assert_eq!(graph, before);
        assert_eq!(graph.request(&p1, &r1), MAX_COUNT);
    }

    #[test]
    fn release_removes_edge_at_zero() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 2).expect("add");
        graph.add_allocation(&p1, &r1, 2).expect("allocate");

        assert_eq!(graph.remove_allocation(&p1, &r1, 1), 1);
        assert_eq!(graph.allocation(&p1, &r1), 1);
        assert_eq!(graph.remove_allocation(&p1, &r1, 1), 1);
        assert_eq!(graph.allocation_edge_count(), 0);
        assert_eq!(graph.resource(&r1).map(|x| x.available), Some(2));
    }

    #[test]
    fn over_release_is_clamped() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 4).expect("add");
        graph.add_allocation(&p1, &r1, 1).expect("allocate");

        assert_eq!(graph.remove_allocation(&p1, &r1, 10), 1);
        assert_eq!(graph.resource(&r1).map(|x| x.available), Some(4));
        assert!(graph.check_invariants().is_ok());
    }

    #[test]
    fn release_without_edge_is_noop() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        let before = graph.clone();

        assert_eq!(graph.remove_allocation(&p1, &r1, 1), 0);
        assert_eq!(graph.remove_allocation(&p("ghost"), &r1, 1), 0);
        assert_eq!(graph, before);
    }

    #[test]
    fn remove_request_canonicalizes() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        graph.add_request(&p1, &r1, 2).expect("request");

        assert_eq!(graph.remove_request(&p1, &r1, 5), 2);
        assert_eq!(graph.request_edge_count(), 0);
    }

    #[test]
    fn remove_process_releases_allocations() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let p2 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 3).expect("add");
        graph.add_allocation(&p1, &r1, 2).expect("allocate");
        graph.add_allocation(&p2, &r1, 1).expect("allocate");
        graph.add_request(&p1, &r1, 1).expect("request");

        let detached = graph.remove_process(&p1).expect("remove");
        assert_eq!(detached.allocations.len(), 1);
        assert_eq!(detached.requests.len(), 1);
        assert_eq!(graph.resource(&r1).map(|x| x.available), Some(2));
        assert_eq!(graph.allocation(&p2, &r1), 1);
        assert!(graph.check_invariants().is_ok());
    }

    #[test]
    fn remove_resource_drops_edges() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        let r2 = graph.add_resource(None, 1).expect("add");
        graph.add_allocation(&p1, &r1, 1).expect("allocate");
        graph.add_request(&p1, &r2, 1).expect("request");

        let (accounting, detached) = graph.remove_resource(&r1).expect("remove");
        assert_eq!(accounting.total, 1);
        assert_eq!(detached.allocations.len(), 1);
        assert_eq!(graph.allocation_edge_count(), 0);
        assert_eq!(graph.request(&p1, &r2), 1);
        assert!(graph.check_invariants().is_ok());
    }

    #[test]
    fn remove_unknown_node_rejected() {
        let mut graph = ResourceGraph::new();
        assert!(matches!(
            graph.remove_process(&p("P1")),
            Err(RagError::UnknownEntity(_))
        ));
        assert!(matches!(
            graph.remove_resource(&r("R1")),
            Err(RagError::UnknownEntity(_))
        ));
    }

    #[test]
    fn per_process_listings_are_ordered() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let p2 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 5).expect("add");
        let r2 = graph.add_resource(None, 5).expect("add");
        graph.add_allocation(&p1, &r2, 1).expect("allocate");
        graph.add_allocation(&p1, &r1, 2).expect("allocate");
        graph.add_allocation(&p2, &r1, 1).expect("allocate");

        let held: Vec<_> = graph
            .allocations_of(&p1)
            .map(|(res, count)| (res.clone(), count))
            .collect();
        assert_eq!(held, vec![(r1, 2), (r2, 1)]);
        assert_eq!(graph.requests_of(&p1).count(), 0);
    }

    #[test]
    fn check_invariants_catches_capacity_mismatch() {
        let mut resources = BTreeMap::new();
        resources.insert(
            r("R1"),
            Resource {
                total: 1,
                available: 1,
            },
        );
        let mut processes = BTreeSet::new();
        processes.insert(p("P1"));
        let mut allocations = BTreeMap::new();
        allocations.insert(EdgeKey::new(p("P1"), r("R1")), 1);

        let graph = ResourceGraph::from_parts(processes, resources, BTreeMap::new(), allocations);
        assert!(matches!(
            graph.check_invariants(),
            Err(RagError::MalformedState(_))
        ));
    }

    #[test]
    fn reset_empties_store() {
        let mut graph = ResourceGraph::new();
        graph.add_process(None).expect("add");
        graph.add_resource(None, 2).expect("add");
        graph.reset();
        assert_eq!(graph, ResourceGraph::new());
    }
}
