//! Run report - per-resource outcomes of one convergence run

use crate::types::{Outcome, ResourceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: ResourceKey,
    pub description: String,
    pub outcome: Outcome,
    /// Changed resources that notified this one during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notified_by: Vec<ResourceKey>,
}

/// Summary counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub unchanged: usize,
    pub applied: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl ExecuteSummary {
    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.unchanged + self.applied + self.failed + self.blocked
    }

    /// Check if execution was fully successful (desired end state reached)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Add an outcome to the summary
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Applied { .. } => self.applied += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Blocked { .. } => self.blocked += 1,
        }
    }
}

/// Result of a convergence run, entries in plan order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for entry in &self.entries {
            summary.add(&entry.outcome);
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| !e.outcome.is_failure())
    }

    /// Outcome recorded for `key`
    pub fn outcome(&self, key: &ResourceKey) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| &e.outcome)
    }

    /// Entries that changed something
    pub fn changed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_change())
    }

    /// First-line error text for every failed or blocked resource
    pub fn failures(&self) -> Vec<(&ResourceKey, String)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.error_line().map(|line| (&e.key, line)))
            .collect()
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
