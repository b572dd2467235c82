//! Resource trait and declarations
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state. A [`Declaration`] pairs a
//! resource with its ordering (`require`) and trigger (`notify`) edges.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, Attributes, ResourceKey, ResourceKind, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (key, description)
/// - Static validation of its attributes
/// - State detection (current vs desired)
/// - State convergence (apply) and notification handling (refresh)
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Resource, ResourceKey, ResourceState};
///
/// #[derive(Debug)]
/// struct Marker { path: std::path::PathBuf }
///
/// impl Resource for Marker {
///     fn key(&self) -> ResourceKey {
///         ResourceKey::exec(self.path.display().to_string())
///     }
///
///     fn description(&self) -> String {
///         format!("Touch {}", self.path.display())
///     }
///
///     fn current_state(&self) -> anyhow::Result<ResourceState> {
///         Ok(if self.path.exists() {
///             ResourceState::Present { details: None }
///         } else {
///             ResourceState::Absent
///         })
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, _ctx: &ApplyContext) -> anyhow::Result<ApplyResult> {
///         std::fs::write(&self.path, b"")?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique (kind, name) identity of this resource
    fn key(&self) -> ResourceKey;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Kind-specific attributes, as declared
    ///
    /// Used for display and for asserting on the declared contract.
    fn attributes(&self) -> Attributes {
        Attributes::new()
    }

    /// Check the static attributes, returning a message on failure
    ///
    /// Called for every declaration before a plan is built.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.key().name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }

    /// Detect the current state of this resource
    ///
    /// An error means the state is unknown; the engine treats that as
    /// "needs apply".
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        Ok(!current.satisfies(&self.desired_state()))
    }

    /// Apply changes to reach the desired state
    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult>;

    /// React to a notification from a changed resource
    ///
    /// Only called when the resource is already in its desired state.
    /// The default does nothing.
    fn refresh(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::NoChange)
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// A resource together with its outgoing edges
#[derive(Debug)]
pub struct Declaration {
    pub resource: BoxedResource,
    /// Resources that must converge before this one
    pub requires: Vec<ResourceKey>,
    /// Resources that converge after this one and are refreshed when it changes
    pub notifies: Vec<ResourceKey>,
}

impl Declaration {
    pub fn new(resource: impl Resource + 'static) -> Self {
        Self::boxed(Box::new(resource))
    }

    pub fn boxed(resource: BoxedResource) -> Self {
        Self {
            resource,
            requires: Vec::new(),
            notifies: Vec::new(),
        }
    }

    /// Add an ordering edge: `target` converges first
    pub fn require(mut self, target: ResourceKey) -> Self {
        if !self.requires.contains(&target) {
            self.requires.push(target);
        }
        self
    }

    /// Add several ordering edges
    pub fn require_all(self, targets: impl IntoIterator<Item = ResourceKey>) -> Self {
        targets.into_iter().fold(self, Self::require)
    }

    /// Add a trigger edge: `target` converges after and is refreshed on change
    pub fn notify(mut self, target: ResourceKey) -> Self {
        if !self.notifies.contains(&target) {
            self.notifies.push(target);
        }
        self
    }

    pub fn key(&self) -> ResourceKey {
        self.resource.key()
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.key().kind
    }
}
