//! Apply context and progress callbacks
//!
//! These let the engine report to a UI without depending on any
//! particular terminal library.

use crate::types::{Outcome, ResourceKey, ResourceState};
use std::time::Duration;

/// Progress callback for convergence runs
///
/// Calls follow the per-resource state machine:
/// `on_probed` (Pending → Probed), `on_apply_start` (→ Applying) and
/// finally `on_resource_complete` with the terminal outcome. Blocked
/// resources only ever see `on_resource_complete`.
pub trait ProgressCallback: Send {
    /// Called once before the first resource
    fn on_run_start(&mut self, total: usize);

    /// Called after the current state of a resource is known
    fn on_probed(&mut self, key: &ResourceKey, current: &ResourceState);

    /// Called when an apply or refresh begins
    fn on_apply_start(&mut self, key: &ResourceKey, description: &str);

    /// Called with the terminal outcome of a resource
    fn on_resource_complete(&mut self, key: &ResourceKey, outcome: &Outcome);

    /// Called once after the last resource
    fn on_run_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _total: usize) {}
    fn on_probed(&mut self, _key: &ResourceKey, _current: &ResourceState) {}
    fn on_apply_start(&mut self, _key: &ResourceKey, _description: &str) {}
    fn on_resource_complete(&mut self, _key: &ResourceKey, _outcome: &Outcome) {}
    fn on_run_complete(&mut self) {}
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Default)]
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
    /// Wall-clock limit for commands run by this apply
    pub timeout: Option<Duration>,
    /// Resources whose change notified this one (empty for plain applies)
    pub notified_by: Vec<ResourceKey>,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(verbose: bool, timeout: Option<Duration>) -> Self {
        Self {
            verbose,
            timeout,
            notified_by: Vec::new(),
        }
    }

    /// Whether this apply was triggered by a notification
    pub fn is_refresh(&self) -> bool {
        !self.notified_by.is_empty()
    }
}
