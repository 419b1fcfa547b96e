//! # Resolution Guide
//!
//! Advisory guidance derived from a [`DetectionResult`] and the store's
//! current edges. This never re-runs detection and never mutates the store.
//!
//! The release target is a *representative* deadlocked process (the first in
//! identifier order). It is not chosen to be the most effective cycle
//! breaker.

use crate::detection::DetectionResult;
use crate::graph::ResourceGraph;
use crate::{ProcessId, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resource with an instance count attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCount {
    pub resource: ResourceId,
    pub count: u64,
}

/// What one deadlocked process wants and holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub process: ProcessId,
    /// Implicated (unsatisfiable) requests with their outstanding counts.
    pub blocked_requests: Vec<ResourceCount>,
    /// Everything the process currently holds.
    pub allocations: Vec<ResourceCount>,
}

/// Structured resolution guidance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionGuide {
    /// One report per deadlocked process, in identifier order. Empty when safe.
    pub reports: Vec<ProcessReport>,
    /// Representative process suggested for releasing allocations.
    pub release_target: Option<ProcessId>,
    /// Full allocations of the target on resources it is itself blocked on.
    pub suggested_releases: Vec<ResourceCount>,
}

impl ResolutionGuide {
    /// Build guidance from a detection result and the store it was run on.
    #[must_use]
    pub fn build(result: &DetectionResult, graph: &ResourceGraph) -> Self {
        let reports: Vec<ProcessReport> = result
            .deadlocked_processes()
            .map(|process| ProcessReport {
                process: process.clone(),
                blocked_requests: result
                    .implicated_resources(process)
                    .map(|resource| ResourceCount {
                        resource: resource.clone(),
                        count: graph.request(process, resource),
                    })
                    .collect(),
                allocations: graph
                    .allocations_of(process)
                    .map(|(resource, count)| ResourceCount {
                        resource: resource.clone(),
                        count,
                    })
                    .collect(),
            })
            .collect();

        let release_target = result.deadlocked_processes().next().cloned();

        let suggested_releases: Vec<ResourceCount> = release_target
            .as_ref()
            .map(|target| {
                result
                    .implicated_resources(target)
                    .filter_map(|resource| {
                        let held = graph.allocation(target, resource);
                        (held > 0).then(|| ResourceCount {
                            resource: resource.clone(),
                            count: held,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            reports,
            release_target,
            suggested_releases,
        }
    }

    /// True when the guide describes a safe system.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.reports.is_empty()
    }
}

fn join_counts(items: &[ResourceCount], verb: &str) -> String {
    if items.is_empty() {
        return "None".to_string();
    }
    items
        .iter()
        .map(|item| format!("{} ({} {})", item.resource, item.count, verb))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ResolutionGuide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_safe() {
            return writeln!(f, "No deadlock detected. The system is in a safe state.");
        }

        writeln!(f, "Deadlock Resolution Guide:")?;
        writeln!(f)?;
        let names: Vec<&str> = self.reports.iter().map(|r| r.process.as_str()).collect();
        writeln!(f, "Deadlocked Processes: {}", names.join(", "))?;
        writeln!(f, "Involved Resources and Requests:")?;
        for report in &self.reports {
            writeln!(
                f,
                "- {}: Requests: {}, Allocations: {}",
                report.process,
                join_counts(&report.blocked_requests, "requested"),
                join_counts(&report.allocations, "allocated")
            )?;
        }

        writeln!(f)?;
        writeln!(f, "How to Resolve:")?;
        writeln!(f, "1. Identify a process holding resources that others need.")?;
        if let Some(target) = &self.release_target {
            writeln!(f, "   - Suggestion: Release allocations from {}.", target)?;
        }
        writeln!(f, "2. Release enough resources to break the cycle:")?;
        if let Some(target) = &self.release_target {
            for release in &self.suggested_releases {
                writeln!(
                    f,
                    "   - Release {} instance(s) of {} from {}.",
                    release.count, release.resource, target
                )?;
            }
        }
        writeln!(f, "3. Adjust requests or add resources as needed.")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DeadlockDetector;

    fn guide_for(graph: &ResourceGraph) -> ResolutionGuide {
        ResolutionGuide::build(&DeadlockDetector::detect(graph), graph)
    }

    #[test]
    fn safe_system_gets_single_message() {
        let mut graph = ResourceGraph::new();
        graph.add_process(None).expect("add");
        let guide = guide_for(&graph);

        assert!(guide.is_safe());
        assert_eq!(guide.release_target, None);
        assert_eq!(
            guide.to_string(),
            "No deadlock detected. The system is in a safe state.\n"
        );
    }

    #[test]
    fn deadlock_lists_requests_and_allocations() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let p2 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        let r2 = graph.add_resource(None, 1).expect("add");
        graph.add_allocation(&p1, &r1, 1).expect("allocate");
        graph.add_allocation(&p2, &r2, 1).expect("allocate");
        graph.add_request(&p1, &r2, 1).expect("request");
        graph.add_request(&p2, &r1, 1).expect("request");

        let guide = guide_for(&graph);
        assert_eq!(guide.reports.len(), 2);
        assert_eq!(guide.release_target, Some(p1.clone()));
        assert_eq!(
            guide.reports[0].blocked_requests,
            vec![ResourceCount {
                resource: r2.clone(),
                count: 1
            }]
        );
        assert_eq!(
            guide.reports[0].allocations,
            vec![ResourceCount {
                resource: r1.clone(),
                count: 1
            }]
        );

        let text = guide.to_string();
        assert!(text.contains("Deadlocked Processes: P1, P2"));
        assert!(text.contains("- P1: Requests: R2 (1 requested), Allocations: R1 (1 allocated)"));
        assert!(text.contains("Suggestion: Release allocations from P1."));
        assert!(text.contains("3. Adjust requests or add resources as needed."));
    }

    #[test]
    fn suggests_release_only_of_held_implicated_resources() {
        // P1 holds one R1 and wants two more: its own allocation is implicated.
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let p2 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 2).expect("add");
        graph.add_allocation(&p1, &r1, 1).expect("allocate");
        graph.add_allocation(&p2, &r1, 1).expect("allocate");
        graph.add_request(&p1, &r1, 2).expect("request");
        graph.add_request(&p2, &r1, 2).expect("request");

        let guide = guide_for(&graph);
        assert_eq!(
            guide.suggested_releases,
            vec![ResourceCount {
                resource: r1,
                count: 1
            }]
        );
        assert!(
            guide
                .to_string()
                .contains("Release 1 instance(s) of R1 from P1.")
        );
    }

    #[test]
    fn no_release_suggested_when_target_holds_nothing_implicated() {
        let mut graph = ResourceGraph::new();
        let p1 = graph.add_process(None).expect("add");
        let r1 = graph.add_resource(None, 1).expect("add");
        graph.add_request(&p1, &r1, 2).expect("request");

        let guide = guide_for(&graph);
        assert_eq!(guide.release_target, Some(p1));
        assert!(guide.suggested_releases.is_empty());
        assert!(guide.to_string().contains("Allocations: None"));
    }
}
