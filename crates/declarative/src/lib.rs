//! # Declarative
//!
//! A framework for idempotent, dependency-ordered resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! ordering declarations into a plan, detecting current state, and
//! converging a host to match.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (package, user, command, service)
//! - **Declaration**: A resource plus its `require` (ordering) and `notify` (trigger) edges
//! - **ResourceGraph**: Validated, acyclic declarations in a stable topological order
//! - **converge**: Walks the plan, applying only what diverges, and reports per-resource outcomes
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{converge_simple, Declaration, ExecuteOptions, ResourceGraph, ResourceKey};
//!
//! let graph = ResourceGraph::build(vec![
//!     Declaration::new(my_package("wget")),
//!     Declaration::new(my_exec("download"))
//!         .require(ResourceKey::package("wget"))
//!         .notify(ResourceKey::exec("untar")),
//!     Declaration::new(my_exec("untar")),
//! ])?;
//!
//! let report = converge_simple(&graph, &ExecuteOptions::default())?;
//! assert!(report.is_success());
//! ```
//!
//! ## Failure Model
//!
//! Plan errors ([`Error::Validation`], [`Error::UnresolvedReference`],
//! [`Error::Cycle`], ...) are returned by [`ResourceGraph::build`] before
//! anything runs. Apply failures are recorded in the [`RunReport`]; the
//! failed resource's dependents are reported as blocked while independent
//! branches still converge.

pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod graph;
pub mod report;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_kind};
pub use engine::{converge, converge_simple};
pub use error::{Error, Result};
pub use graph::ResourceGraph;
pub use report::{ExecuteSummary, ReportEntry, RunReport};
pub use resource::{BoxedResource, Declaration, Resource};
pub use types::{
    ApplyResult, Attributes, Change, CommandOutput, ExecuteOptions, Outcome, ResourceKey,
    ResourceKind, ResourceState,
};
