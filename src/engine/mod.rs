//! Terminal front end of the convergence engine
//!
//! 1. Diffing - probe every resource and show what would change
//! 2. Executing - confirm, converge with progress, and summarize the report

pub mod differ;
pub mod executor;

pub use differ::display_diff;
pub use executor::{ApplyOptions, execute};
