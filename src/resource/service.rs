//! Service resource - keep a system service running and enabled

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
use crate::host::{CommandSpec, Host, ServiceStatus};

/// A service kept running through the host's service manager
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    /// Also enable at boot
    pub enable: bool,
    /// The service manager can restart it directly
    pub hasrestart: bool,
    /// Command run instead of a restart when notified
    pub restart: Option<String>,
    host: Host,
}

impl Service {
    pub fn new(name: &str, host: &Host) -> Self {
        Self {
            name: name.to_string(),
            enable: false,
            hasrestart: false,
            restart: None,
            host: host.clone(),
        }
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn hasrestart(mut self, hasrestart: bool) -> Self {
        self.hasrestart = hasrestart;
        self
    }

    pub fn restart_command(mut self, command: &str) -> Self {
        self.restart = Some(command.to_string());
        self
    }

    /// The parts of `status` this resource manages, as text
    fn describe(&self, status: ServiceStatus) -> String {
        let run = if status.running { "running" } else { "stopped" };
        if self.enable {
            format!("{run}, {}", if status.enabled { "enabled" } else { "disabled" })
        } else {
            run.to_string()
        }
    }

    fn wanted(&self) -> ServiceStatus {
        ServiceStatus {
            running: true,
            enabled: self.enable,
        }
    }

    fn in_sync(&self, status: ServiceStatus) -> bool {
        status.running && (!self.enable || status.enabled)
    }
}

impl Resource for Service {
    fn key(&self) -> ResourceKey {
        ResourceKey::service(&self.name)
    }

    fn description(&self) -> String {
        if self.enable {
            format!("Start and enable service {}", self.name)
        } else {
            format!("Start service {}", self.name)
        }
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("ensure".into(), "running".into());
        attrs.insert("enable".into(), self.enable.to_string());
        attrs.insert("hasrestart".into(), self.hasrestart.to_string());
        if let Some(restart) = &self.restart {
            attrs.insert("restart".into(), restart.clone());
        }
        attrs
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.restart.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err("restart command must not be empty".to_string());
        }
        Ok(())
    }

    fn current_state(&self) -> Result<ResourceState> {
        let status = self.host.probe.service_status(&self.name)?;
        if self.in_sync(status) {
            return Ok(self.desired_state());
        }
        Ok(ResourceState::Modified {
            from: self.describe(status),
            to: self.describe(self.wanted()),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.describe(self.wanted())),
        }
    }

    /// Bring the service to its wanted state
    ///
    /// When the status cannot be read, every action is issued.
    fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        let status = match self.host.probe.service_status(&self.name) {
            Ok(status) if self.in_sync(status) => return Ok(ApplyResult::NoChange),
            Ok(status) => Some(status),
            Err(e) => {
                log::warn!("{}: status unknown ({e:#}), applying all actions", self.key());
                None
            }
        };
        let backend = &self.host.backend;
        if status.is_none_or(|s| !s.running) {
            backend.start_service(&self.name)?;
        }
        if self.enable && status.is_none_or(|s| !s.enabled) {
            backend.enable_service(&self.name)?;
        }
        Ok(ApplyResult::Modified)
    }

    /// Restart (or reload) a running service after a notifying change
    fn refresh(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        let backend = &self.host.backend;
        if let Some(command) = &self.restart {
            let spec = CommandSpec {
                timeout: ctx.timeout,
                ..CommandSpec::new(command.as_str())
            };
            let output = backend.run_command(&spec)?;
            if !output.success {
                bail!("`{command}` failed with {}", output.failure_message());
            }
        } else if self.hasrestart {
            backend.restart_service(&self.name)?;
        } else {
            backend.stop_service(&self.name)?;
            backend.start_service(&self.name)?;
        }
        Ok(ApplyResult::Refreshed)
    }
}
