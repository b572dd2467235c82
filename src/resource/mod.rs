//! Concrete resources for provisioning a Linux host
//!
//! Every resource reads state through the host's probe and changes it
//! through the host's backend; see [`crate::host`].

pub mod exec;
pub mod group;
pub mod package;
pub mod service;
pub mod user;

pub use declarative::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
pub use exec::Exec;
pub use group::Group;
pub use package::Package;
pub use service::Service;
pub use user::User;
