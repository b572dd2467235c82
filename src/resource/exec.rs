//! Guarded shell command resource

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
use crate::host::{CommandSpec, Host};
use crate::runner::TimedOut;

/// A shell command that runs until its `creates` path exists
///
/// Without `creates` the command runs on every convergence.
#[derive(Debug, Clone)]
pub struct Exec {
    pub title: String,
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// `PATH` for the command
    pub path: Option<String>,
    pub creates: Option<PathBuf>,
    host: Host,
}

impl Exec {
    pub fn new(title: &str, command: &str, host: &Host) -> Self {
        Self {
            title: title.to_string(),
            command: command.to_string(),
            cwd: None,
            path: None,
            creates: None,
            host: host.clone(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn creates(mut self, creates: impl Into<PathBuf>) -> Self {
        self.creates = Some(creates.into());
        self
    }
}

impl Resource for Exec {
    fn key(&self) -> ResourceKey {
        ResourceKey::exec(&self.title)
    }

    fn description(&self) -> String {
        format!("Run `{}`", self.command)
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("command".into(), self.command.clone());
        if let Some(cwd) = &self.cwd {
            attrs.insert("cwd".into(), cwd.display().to_string());
        }
        if let Some(path) = &self.path {
            attrs.insert("path".into(), path.clone());
        }
        if let Some(creates) = &self.creates {
            attrs.insert("creates".into(), creates.display().to_string());
        }
        attrs
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.command.trim().is_empty() {
            return Err("command must not be empty".to_string());
        }
        for (attr, path) in [("cwd", &self.cwd), ("creates", &self.creates)] {
            if let Some(path) = path
                && !path.is_absolute()
            {
                return Err(format!("{attr} must be an absolute path, got {}", path.display()));
            }
        }
        Ok(())
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(creates) = &self.creates else {
            return Ok(ResourceState::Absent);
        };
        if self.host.probe.path_exists(creates)? {
            Ok(ResourceState::Present {
                details: Some(creates.display().to_string()),
            })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: self.creates.as_ref().map(|c| c.display().to_string()),
        }
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        let spec = CommandSpec {
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            path: self.path.clone(),
            timeout: ctx.timeout,
        };

        let output = match self.host.backend.run_command(&spec) {
            Ok(output) => output,
            Err(e) => match e.downcast_ref::<TimedOut>() {
                Some(TimedOut(limit)) => {
                    return Err(declarative::Error::Timeout {
                        key: self.key(),
                        seconds: limit.as_secs(),
                    }
                    .into());
                }
                None => return Err(e),
            },
        };

        if ctx.verbose {
            for line in output.stdout_str().lines() {
                log::info!("{}: {line}", self.title);
            }
        }
        if !output.success {
            bail!("`{}` failed with {}", self.command, output.failure_message());
        }
        Ok(ApplyResult::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::SimulatedHost;
    use std::sync::Arc;
    use std::time::Duration;

    const UNTAR: &str = "tar -zxvf ngx_openresty-1.7.0.1.tar.gz";

    fn untar(host: &Host) -> Exec {
        Exec::new("untar openresty", UNTAR, host)
            .cwd("/tmp")
            .path("/sbin:/bin:/usr/bin")
            .creates("/tmp/ngx_openresty-1.7.0.1/configure")
    }

    #[test]
    fn test_creates_guard_skips_command() {
        let sim = SimulatedHost::new();
        sim.with_path("/tmp/ngx_openresty-1.7.0.1/configure");
        let exec = untar(&sim.host());
        assert!(!exec.needs_apply().unwrap());
    }

    #[test]
    fn test_apply_runs_command_until_guard_exists() {
        let sim = SimulatedHost::new();
        sim.on_command(UNTAR, "/tmp/ngx_openresty-1.7.0.1/configure");
        let exec = untar(&sim.host());

        assert!(exec.needs_apply().unwrap());
        assert_eq!(
            exec.apply(&ApplyContext::default()).unwrap(),
            ApplyResult::Created
        );
        assert!(!exec.needs_apply().unwrap());
        assert_eq!(sim.calls(), vec![format!("run {UNTAR}")]);
    }

    #[test]
    fn test_exec_without_guard_always_runs() {
        let sim = SimulatedHost::new();
        let exec = Exec::new("ldconfig", "ldconfig", &sim.host());
        exec.apply(&ApplyContext::default()).unwrap();
        assert!(exec.needs_apply().unwrap());
    }

    #[test]
    fn test_nonzero_exit_is_an_error() {
        let sim = SimulatedHost::new();
        sim.fail_command(UNTAR);
        let err = untar(&sim.host())
            .apply(&ApplyContext::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("`{UNTAR}` failed with exit code 1: {UNTAR}: simulated failure")
        );
    }

    #[test]
    fn test_validation() {
        let sim = SimulatedHost::new();
        let host = sim.host();
        assert!(untar(&host).validate().is_ok());
        assert!(Exec::new("blank", "  ", &host).validate().is_err());
        assert_eq!(
            untar(&host).creates("configure").validate(),
            Err("creates must be an absolute path, got configure".to_string())
        );
        assert!(untar(&host).cwd("tmp").validate().is_err());
    }

    #[test]
    fn test_runs_in_cwd_with_restricted_path_on_linux() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let host = Host::shared(Arc::new(crate::host::LinuxHost::detect()));
        let exec = Exec::new("touch", "echo \"$PATH\" > done", &host)
            .cwd(dir.path())
            .path("/sbin:/bin:/usr/bin")
            .creates(&marker);

        assert!(exec.needs_apply().unwrap());
        exec.apply(&ApplyContext::default()).unwrap();
        assert!(!exec.needs_apply().unwrap());
        assert_eq!(
            std::fs::read_to_string(&marker).unwrap().trim(),
            "/sbin:/bin:/usr/bin"
        );
    }

    #[test]
    fn test_timeout_is_reported_with_key() {
        let host = Host::shared(Arc::new(crate::host::LinuxHost::detect()));
        let exec = Exec::new("slow", "sleep 5", &host);
        let ctx = ApplyContext::new(false, Some(Duration::from_secs(1)));
        let err = exec.apply(&ctx).unwrap_err();
        assert_eq!(err.to_string(), "Exec[slow] timed out after 1s");
    }
}
