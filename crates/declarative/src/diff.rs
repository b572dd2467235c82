//! Diff computation for resources
//!
//! A read-only preview of a run: every resource is probed, nothing is
//! applied.

use crate::graph::ResourceGraph;
use crate::resource::Resource;
use crate::types::{ResourceKey, ResourceState};
use serde::{Deserialize, Serialize};

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Identity of the resource
    pub key: ResourceKey,
    /// Human-readable description
    pub description: String,
    /// Current state (`Unknown` if the probe failed)
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// Probe error text, if the state could not be determined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Option<Self> {
        let desired = resource.desired_state();
        let (current, probe_error) = match resource.current_state() {
            Ok(state) => (state, None),
            Err(e) => (ResourceState::Unknown, Some(format!("{e:#}"))),
        };

        if current.satisfies(&desired) {
            return None;
        }

        Some(Self {
            key: resource.key(),
            description: resource.description(),
            current,
            desired,
            probe_error,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(self.current, ResourceState::Modified { .. })
            || matches!(
                (&self.current, &self.desired),
                (ResourceState::Present { .. }, ResourceState::Present { .. })
            )
    }

    /// Check if the current state could not be determined
    pub fn is_unknown(&self) -> bool {
        matches!(self.current, ResourceState::Unknown)
    }
}

/// Compute diffs for every resource in plan order
///
/// Returns only resources that have differences between current and desired
/// state. Note that a diff does not account for earlier resources changing
/// the host during a real run.
pub fn compute_diffs(graph: &ResourceGraph) -> Vec<ResourceDiff> {
    graph.iter().filter_map(ResourceDiff::from_resource).collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to create
    pub additions: usize,
    /// Number of resources to modify
    pub modifications: usize,
    /// Number of resources whose state is unknown
    pub unknown: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_unknown() {
                summary.unknown += 1;
            } else if diff.is_addition() {
                summary.additions += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.modifications + self.unknown
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind, kinds in declaration-kind order
pub fn group_by_kind(diffs: &[ResourceDiff]) -> Vec<(crate::types::ResourceKind, Vec<&ResourceDiff>)> {
    crate::types::ResourceKind::ALL
        .into_iter()
        .map(|kind| {
            (
                kind,
                diffs.iter().filter(|d| d.key.kind == kind).collect::<Vec<_>>(),
            )
        })
        .filter(|(_, group)| !group.is_empty())
        .collect()
}
