//! Host access for resources
//!
//! Resources never touch the system directly. They read state through a
//! [`Probe`] and change it through a [`Backend`]:
//! - package backend (install)
//! - account management (groups, users)
//! - process executor (guarded shell commands)
//! - service manager (start, enable, restart)
//!
//! [`LinuxHost`] implements both against the real machine.

use anyhow::Result;
use declarative::CommandOutput;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod linux;
#[cfg(test)]
pub mod simulated;

pub use linux::LinuxHost;

/// A group account to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub name: String,
}

/// A user account to manage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub name: String,
    /// Supplementary groups; the first one is also used as primary group on creation
    pub groups: Vec<String>,
    pub comment: Option<String>,
    pub shell: Option<PathBuf>,
    pub system: bool,
}

/// How an existing account compares to a [`UserSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserState {
    Absent,
    /// Exists, but these attributes differ
    Differs(Vec<String>),
    Matches,
}

/// A shell command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// Replacement for `PATH` while the command runs
    pub path: Option<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            path: None,
            timeout: None,
        }
    }
}

/// Observed run/enable state of a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub enabled: bool,
}

/// Read-only queries about current host state
///
/// Every call may fail (backend unavailable, permission denied); callers
/// treat a failure as "unknown".
pub trait Probe: Send + Sync {
    /// Is `name` installed (at `version`, when given)?
    fn package_installed(&self, name: &str, version: Option<&str>) -> Result<bool>;

    /// Does the group exist?
    fn group_exists(&self, group: &GroupSpec) -> Result<bool>;

    /// Does the user exist with these attributes?
    fn user_state(&self, user: &UserSpec) -> Result<UserState>;

    /// Does `path` exist? Used only as an Exec guard.
    fn path_exists(&self, path: &Path) -> Result<bool>;

    /// Is the service running / enabled at boot?
    fn service_status(&self, name: &str) -> Result<ServiceStatus>;
}

/// Mutating operations delegated to the host
pub trait Backend: Send + Sync {
    fn install_package(&self, name: &str, version: Option<&str>) -> Result<()>;

    fn create_group(&self, group: &GroupSpec) -> Result<()>;

    fn create_user(&self, user: &UserSpec) -> Result<()>;

    fn modify_user(&self, user: &UserSpec) -> Result<()>;

    /// Run a shell command; a non-zero exit is reported in the output, not as `Err`
    fn run_command(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    fn start_service(&self, name: &str) -> Result<()>;

    fn stop_service(&self, name: &str) -> Result<()>;

    fn enable_service(&self, name: &str) -> Result<()>;

    fn restart_service(&self, name: &str) -> Result<()>;
}

/// Shared handle to a probe and backend, cloned into every resource
#[derive(Clone)]
pub struct Host {
    pub probe: Arc<dyn Probe>,
    pub backend: Arc<dyn Backend>,
}

impl Host {
    /// Use one object as both probe and backend
    pub fn shared<T: Probe + Backend + 'static>(host: Arc<T>) -> Self {
        Self {
            probe: host.clone(),
            backend: host,
        }
    }

    /// The real machine
    pub fn linux() -> Self {
        Self::shared(Arc::new(LinuxHost::detect()))
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Host")
    }
}
