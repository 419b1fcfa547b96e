//! # Graph Metrics
//!
//! Counts and instance totals for status displays.
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `process_count` | Registered processes |
//! | `resource_count` | Registered resources |
//! | `request_edge_count` | Positive request edges |
//! | `allocation_edge_count` | Positive allocation edges |
//! | `total_instances` | Sum of `total` over all resources |
//! | `available_instances` | Sum of `available` over all resources |
//! | `held_instances` | `total_instances - available_instances` |
//! | `utilization_percent` | Held share of all instances, rounded down |

use crate::graph::ResourceGraph;
use serde::{Deserialize, Serialize};

/// Snapshot of store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub process_count: usize,
    pub resource_count: usize,
    pub request_edge_count: usize,
    pub allocation_edge_count: usize,
    pub total_instances: u64,
    pub available_instances: u64,
    pub held_instances: u64,
    /// Whole percent in `0..=100`. Zero when there are no instances.
    pub utilization_percent: u64,
}

impl GraphMetrics {
    /// Create new metrics with all zeros.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute metrics from a store.
    #[must_use]
    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let (total_instances, available_instances) = graph
            .resources()
            .fold((0u64, 0u64), |(total, available), (_, resource)| {
                (
                    total.saturating_add(resource.total),
                    available.saturating_add(resource.available),
                )
            });
        let held_instances = total_instances.saturating_sub(available_instances);

        // Integer percent, rounded down
        let utilization_percent = held_instances
            .saturating_mul(100)
            .checked_div(total_instances)
            .unwrap_or(0);

        Self {
            process_count: graph.process_count(),
            resource_count: graph.resource_count(),
            request_edge_count: graph.request_edge_count(),
            allocation_edge_count: graph.allocation_edge_count(),
            total_instances,
            available_instances,
            held_instances,
            utilization_percent,
        }
    }

    /// True when the store has no processes and no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.process_count == 0 && self.resource_count == 0
    }
}
