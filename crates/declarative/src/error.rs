//! Error types for the declarative engine.
//!
//! Plan-time errors (`Validation`, `DuplicateResource`, `UnresolvedReference`,
//! `Cycle`) abort a run before anything is applied. Run-time errors (`Probe`,
//! `Apply`, `Timeout`) are recorded against a single resource in the report.

use crate::types::ResourceKey;

/// Result type alias for declarative operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or converging a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A resource carries malformed attributes.
    #[error("invalid resource {key}: {message}")]
    Validation {
        /// Resource that failed validation.
        key: ResourceKey,
        /// What is wrong with it.
        message: String,
    },

    /// Two declarations share the same kind and name.
    #[error("duplicate declaration of {0}")]
    DuplicateResource(ResourceKey),

    /// A require/notify edge points at a resource that was never declared.
    #[error("{from} references undeclared resource {target}")]
    UnresolvedReference {
        /// Resource holding the edge.
        from: ResourceKey,
        /// Missing target.
        target: ResourceKey,
    },

    /// The require/notify relation contains a cycle.
    #[error("dependency cycle: {}", format_cycle(.0))]
    Cycle(Vec<ResourceKey>),

    /// Current state of a resource could not be determined.
    #[error("cannot probe {key}: {message}")]
    Probe {
        /// Resource being probed.
        key: ResourceKey,
        /// Underlying error.
        message: String,
    },

    /// Applying a resource failed.
    #[error("{key} failed: {message}")]
    Apply {
        /// Resource being applied.
        key: ResourceKey,
        /// Underlying error.
        message: String,
    },

    /// A command exceeded its wall-clock limit.
    #[error("{key} timed out after {seconds}s")]
    Timeout {
        /// Resource being applied.
        key: ResourceKey,
        /// Configured limit.
        seconds: u64,
    },
}

impl Error {
    /// Whether this error invalidates the whole plan (nothing may be applied).
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::DuplicateResource(_)
                | Self::UnresolvedReference { .. }
                | Self::Cycle(_)
        )
    }

    /// Build a validation error for `key`.
    pub fn validation(key: ResourceKey, message: impl Into<String>) -> Self {
        Self::Validation {
            key,
            message: message.into(),
        }
    }
}

fn format_cycle(keys: &[ResourceKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
