//! In-memory host for tests
//!
//! Keeps packages, accounts, paths and services in memory and records every
//! backend call in order, so scenarios can assert both on end state and on
//! exactly what was asked of the host.

use super::{Backend, CommandSpec, GroupSpec, Host, Probe, ServiceStatus, UserSpec, UserState};
use anyhow::{Result, anyhow, bail};
use declarative::CommandOutput;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    packages: BTreeSet<String>,
    groups: BTreeSet<String>,
    users: BTreeMap<String, UserSpec>,
    paths: BTreeSet<PathBuf>,
    services: BTreeMap<String, ServiceStatus>,
    /// Paths a command produces when it succeeds
    effects: HashMap<String, Vec<PathBuf>>,
    failing: BTreeSet<String>,
    probe_outage: bool,
    calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SimulatedHost {
    state: Mutex<State>,
}

impl SimulatedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handle for resources backed by this host
    pub fn host(self: &Arc<Self>) -> Host {
        Host::shared(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn with_package(&self, name: &str) -> &Self {
        self.state().packages.insert(name.to_string());
        self
    }

    pub fn with_group(&self, name: &str) -> &Self {
        self.state().groups.insert(name.to_string());
        self
    }

    pub fn with_user(&self, user: UserSpec) -> &Self {
        self.state().users.insert(user.name.clone(), user);
        self
    }

    pub fn with_path(&self, path: impl Into<PathBuf>) -> &Self {
        self.state().paths.insert(path.into());
        self
    }

    pub fn with_service(&self, name: &str, status: ServiceStatus) -> &Self {
        self.state().services.insert(name.to_string(), status);
        self
    }

    /// Running `command` successfully creates `path`
    pub fn on_command(&self, command: &str, path: impl Into<PathBuf>) -> &Self {
        self.state()
            .effects
            .entry(command.to_string())
            .or_default()
            .push(path.into());
        self
    }

    /// Running `command` exits non-zero
    pub fn fail_command(&self, command: &str) -> &Self {
        self.state().failing.insert(command.to_string());
        self
    }

    /// Every probe call errors
    pub fn probe_outage(&self, down: bool) -> &Self {
        self.state().probe_outage = down;
        self
    }

    pub fn has_path(&self, path: &Path) -> bool {
        self.state().paths.contains(path)
    }

    pub fn service(&self, name: &str) -> ServiceStatus {
        self.state().services.get(name).copied().unwrap_or_default()
    }

    pub fn user(&self, name: &str) -> Option<UserSpec> {
        self.state().users.get(name).cloned()
    }

    /// Backend calls in the order they happened
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn probe_ok(&self) -> Result<()> {
        if self.state().probe_outage {
            bail!("probe backend unavailable");
        }
        Ok(())
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

impl Probe for SimulatedHost {
    fn package_installed(&self, name: &str, _version: Option<&str>) -> Result<bool> {
        self.probe_ok()?;
        Ok(self.state().packages.contains(name))
    }

    fn group_exists(&self, group: &GroupSpec) -> Result<bool> {
        self.probe_ok()?;
        Ok(self.state().groups.contains(&group.name))
    }

    fn user_state(&self, user: &UserSpec) -> Result<UserState> {
        self.probe_ok()?;
        let state = self.state();
        let Some(existing) = state.users.get(&user.name) else {
            return Ok(UserState::Absent);
        };

        let mut differs = Vec::new();
        if user.comment.is_some() && existing.comment != user.comment {
            differs.push("comment".to_string());
        }
        if user.shell.is_some() && existing.shell != user.shell {
            differs.push("shell".to_string());
        }
        if user.groups.iter().any(|g| !existing.groups.contains(g)) {
            differs.push("groups".to_string());
        }
        Ok(if differs.is_empty() {
            UserState::Matches
        } else {
            UserState::Differs(differs)
        })
    }

    fn path_exists(&self, path: &Path) -> Result<bool> {
        self.probe_ok()?;
        Ok(self.state().paths.contains(path))
    }

    fn service_status(&self, name: &str) -> Result<ServiceStatus> {
        self.probe_ok()?;
        Ok(self.service(name))
    }
}

impl Backend for SimulatedHost {
    fn install_package(&self, name: &str, _version: Option<&str>) -> Result<()> {
        self.record(format!("install {name}"));
        self.state().packages.insert(name.to_string());
        Ok(())
    }

    fn create_group(&self, group: &GroupSpec) -> Result<()> {
        self.record(format!("groupadd {}", group.name));
        let mut state = self.state();
        if !state.groups.insert(group.name.clone()) {
            return Err(anyhow!("group '{}' already exists", group.name));
        }
        Ok(())
    }

    fn create_user(&self, user: &UserSpec) -> Result<()> {
        self.record(format!("useradd {}", user.name));
        let mut state = self.state();
        if state.users.contains_key(&user.name) {
            bail!("user '{}' already exists", user.name);
        }
        if let Some(missing) = user.groups.iter().find(|g| !state.groups.contains(*g)) {
            bail!("group '{missing}' does not exist");
        }
        state.users.insert(user.name.clone(), user.clone());
        Ok(())
    }

    fn modify_user(&self, user: &UserSpec) -> Result<()> {
        self.record(format!("usermod {}", user.name));
        let mut state = self.state();
        if !state.users.contains_key(&user.name) {
            bail!("user '{}' does not exist", user.name);
        }
        state.users.insert(user.name.clone(), user.clone());
        Ok(())
    }

    fn run_command(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.record(format!("run {}", spec.command));
        let mut state = self.state();
        if state.failing.contains(&spec.command) {
            return Ok(CommandOutput {
                stderr: format!("{}: simulated failure\n", spec.command).into_bytes(),
                code: Some(1),
                ..CommandOutput::default()
            });
        }
        let created = state.effects.get(&spec.command).cloned().unwrap_or_default();
        state.paths.extend(created);
        Ok(CommandOutput::ok())
    }

    fn start_service(&self, name: &str) -> Result<()> {
        self.record(format!("start {name}"));
        self.state().services.entry(name.to_string()).or_default().running = true;
        Ok(())
    }

    fn stop_service(&self, name: &str) -> Result<()> {
        self.record(format!("stop {name}"));
        self.state().services.entry(name.to_string()).or_default().running = false;
        Ok(())
    }

    fn enable_service(&self, name: &str) -> Result<()> {
        self.record(format!("enable {name}"));
        self.state().services.entry(name.to_string()).or_default().enabled = true;
        Ok(())
    }

    fn restart_service(&self, name: &str) -> Result<()> {
        self.record(format!("restart {name}"));
        self.state().services.entry(name.to_string()).or_default().running = true;
        Ok(())
    }
}
