//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::process::Output;
use std::str::FromStr;
use std::time::Duration;

/// Kind of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Package,
    Group,
    User,
    Exec,
    Service,
}

impl ResourceKind {
    /// All kinds, in display order
    pub const ALL: [Self; 5] = [
        Self::Package,
        Self::Group,
        Self::User,
        Self::Exec,
        Self::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "Package",
            Self::Group => "Group",
            Self::User => "User",
            Self::Exec => "Exec",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// Identity of a resource: unique per (kind, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn package(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Package, name)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Group, name)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::User, name)
    }

    pub fn exec(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Exec, name)
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.name)
    }
}

/// Parses the `Kind[name]` reference syntax
impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = s
            .split_once('[')
            .ok_or_else(|| format!("expected Kind[name], got '{s}'"))?;
        let name = rest
            .strip_suffix(']')
            .ok_or_else(|| format!("missing closing ']' in '{s}'"))?;
        if name.is_empty() {
            return Err(format!("empty resource name in '{s}'"));
        }
        Ok(Self::new(kind.trim().parse()?, name))
    }
}

/// Kind-specific attribute map, ordered for stable display
pub type Attributes = BTreeMap<String, String>;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Whether this (current) state already satisfies `desired`.
    ///
    /// `Unknown` never satisfies anything.
    pub fn satisfies(&self, desired: &ResourceState) -> bool {
        !matches!(self, Self::Unknown) && self == desired
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { details: Some(d) } => f.write_str(d),
            Self::Present { details: None } => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
            Self::Modified { from, .. } => f.write_str(from),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Kind of change a resource made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Resource was created (package installed, command ran, ...)
    Created,
    /// Resource existed and was brought into line
    Modified,
    /// Resource was refreshed in response to a notification
    Refreshed,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Refreshed => "refreshed",
        })
    }
}

/// Result of applying or refreshing a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was refreshed (restart, reload, ...)
    Refreshed,
    /// Apply failed
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        self.change().is_some()
    }

    pub fn change(&self) -> Option<Change> {
        match self {
            Self::Created => Some(Change::Created),
            Self::Modified => Some(Change::Modified),
            Self::Refreshed => Some(Change::Refreshed),
            Self::NoChange | Self::Failed { .. } => None,
        }
    }
}

/// Terminal outcome of one resource in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Already in desired state; nothing done
    Unchanged,
    /// Changed; notifications fired
    Applied { change: Change },
    /// Apply (or refresh) failed
    Failed { error: String },
    /// Skipped because a dependency failed or was itself blocked
    Blocked { by: ResourceKey },
}

impl Outcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Failed or blocked: the desired end state was not reached
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Blocked { .. })
    }

    /// Short status label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::Blocked { .. } => "skipped",
        }
    }

    /// First line of the error text for failed/blocked outcomes
    pub fn error_line(&self) -> Option<String> {
        match self {
            Self::Failed { error } => Some(error.lines().next().unwrap_or_default().to_string()),
            Self::Blocked { by } => Some(format!("blocked: dependency {by} did not converge")),
            Self::Unchanged | Self::Applied { .. } => None,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel jobs; 1 runs strictly in plan order
    pub jobs: usize,
    /// Wall-clock limit for a single Exec command
    pub exec_timeout: Option<Duration>,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            exec_timeout: None,
            verbose: false,
        }
    }
}

/// Output from an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl CommandOutput {
    /// A successful, silent result
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Default::default()
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Describe a failed run: exit code plus the last stderr line
    pub fn failure_message(&self) -> String {
        let code = self
            .code
            .map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"));
        let stderr = self.stderr_str();
        match stderr.trim().lines().last() {
            Some(line) if !line.is_empty() => format!("{code}: {line}"),
            _ => code,
        }
    }
}
