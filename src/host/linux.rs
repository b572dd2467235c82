//! Probe and backend for RPM-based Linux hosts

use super::{Backend, CommandSpec, GroupSpec, Probe, ServiceStatus, UserSpec, UserState};
use crate::runner::{command_exists, run_capture, run_checked, run_output, run_quiet, run_shell};
use anyhow::{Context, Result, bail};
use declarative::CommandOutput;
use std::path::Path;

/// Which service manager the host runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    Systemd,
    /// SysV init scripts driven through `service` and `chkconfig`
    SysV,
}

/// The real machine, driven through the standard command-line tools
#[derive(Debug, Clone)]
pub struct LinuxHost {
    services: ServiceManager,
    installer: &'static str,
}

impl LinuxHost {
    /// Inspect the running system for its service manager and installer
    pub fn detect() -> Self {
        let services = if Path::new("/run/systemd/system").is_dir() {
            ServiceManager::Systemd
        } else {
            ServiceManager::SysV
        };
        let installer = if command_exists("dnf") { "dnf" } else { "yum" };
        log::debug!("host: {services:?} services, {installer} installer");
        Self {
            services,
            installer,
        }
    }

    fn service(&self, name: &str, action: &str) -> Result<()> {
        match self.services {
            ServiceManager::Systemd => run_checked("systemctl", &[action, name]),
            ServiceManager::SysV => run_checked("service", &[name, action]),
        }
        .with_context(|| format!("Failed to {action} service {name}"))
    }
}

fn package_spec(name: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{name}-{v}"),
        None => name.to_string(),
    }
}

/// Look up one `getent` entry; `Ok(None)` when the key does not exist
fn getent(database: &str, key: &str) -> Result<Option<String>> {
    let output = run_output("getent", &[database, key])?;
    match output.code {
        Some(0) => Ok(Some(output.stdout_str().trim().to_string())),
        // 2: key not found
        Some(2) => Ok(None),
        _ => bail!("getent {database} {key}: {}", output.failure_message()),
    }
}

/// Compare a `getent passwd` line plus `id -nG` output against `user`
///
/// `system` only picks the uid range at creation. usermod cannot move an
/// account into that range, so an existing account is not judged on it.
fn user_differences(user: &UserSpec, passwd: &str, member_of: &str) -> Vec<String> {
    // name:password:uid:gid:gecos:home:shell
    let fields: Vec<&str> = passwd.split(':').collect();
    let mut differs = Vec::new();

    if let Some(comment) = &user.comment
        && fields.get(4).copied() != Some(comment.as_str())
    {
        differs.push("comment".to_string());
    }
    if let Some(shell) = &user.shell
        && fields.get(6).map(Path::new) != Some(shell.as_path())
    {
        differs.push("shell".to_string());
    }

    let current: Vec<&str> = member_of.split_whitespace().collect();
    if user.groups.iter().any(|g| !current.contains(&g.as_str())) {
        differs.push("groups".to_string());
    }
    differs
}

impl Probe for LinuxHost {
    fn package_installed(&self, name: &str, version: Option<&str>) -> Result<bool> {
        let spec = package_spec(name, version);
        let output = run_output("rpm", &["-q", &spec])?;
        match output.code {
            Some(0) => Ok(true),
            // rpm -q exits 1 for "package ... is not installed"
            Some(1) if output.stdout_str().contains("is not installed") => Ok(false),
            _ => bail!("rpm -q {spec}: {}", output.failure_message()),
        }
    }

    fn group_exists(&self, group: &GroupSpec) -> Result<bool> {
        Ok(getent("group", &group.name)?.is_some())
    }

    fn user_state(&self, user: &UserSpec) -> Result<UserState> {
        let Some(passwd) = getent("passwd", &user.name)? else {
            return Ok(UserState::Absent);
        };
        let member_of = run_capture("id", &["-nG", &user.name])?;
        let differs = user_differences(user, &passwd, &member_of);
        Ok(if differs.is_empty() {
            UserState::Matches
        } else {
            UserState::Differs(differs)
        })
    }

    fn path_exists(&self, path: &Path) -> Result<bool> {
        path.try_exists()
            .with_context(|| format!("Failed to stat {}", path.display()))
    }

    fn service_status(&self, name: &str) -> Result<ServiceStatus> {
        match self.services {
            ServiceManager::Systemd => Ok(ServiceStatus {
                running: run_quiet("systemctl", &["is-active", "--quiet", name]),
                enabled: run_quiet("systemctl", &["is-enabled", "--quiet", name]),
            }),
            ServiceManager::SysV => {
                let script = Path::new("/etc/init.d").join(name);
                if !script.exists() {
                    return Ok(ServiceStatus::default());
                }
                let runlevels = run_output("chkconfig", &["--list", name])?;
                Ok(ServiceStatus {
                    running: run_quiet("service", &[name, "status"]),
                    enabled: runlevels.success && runlevels.stdout_str().contains(":on"),
                })
            }
        }
    }
}

impl Backend for LinuxHost {
    fn install_package(&self, name: &str, version: Option<&str>) -> Result<()> {
        let spec = package_spec(name, version);
        run_checked(self.installer, &["-y", "install", &spec])
            .with_context(|| format!("Failed to install {spec}"))
    }

    fn create_group(&self, group: &GroupSpec) -> Result<()> {
        run_checked("groupadd", &[&group.name])
            .with_context(|| format!("Failed to create group {}", group.name))
    }

    fn create_user(&self, user: &UserSpec) -> Result<()> {
        let groups = user.groups.join(",");
        let shell = user.shell.as_ref().map(|s| s.display().to_string());

        let mut args = Vec::new();
        if user.system {
            args.push("--system");
        }
        // An existing group of the same name would make useradd's default
        // per-user group collide
        if let Some(primary) = user.groups.first() {
            args.extend(["-g", primary.as_str()]);
        }
        if !groups.is_empty() {
            args.extend(["-G", groups.as_str()]);
        }
        if let Some(comment) = &user.comment {
            args.extend(["-c", comment.as_str()]);
        }
        if let Some(shell) = &shell {
            args.extend(["-s", shell.as_str()]);
        }
        args.push(user.name.as_str());

        run_checked("useradd", &args).with_context(|| format!("Failed to create user {}", user.name))
    }

    fn modify_user(&self, user: &UserSpec) -> Result<()> {
        let groups = user.groups.join(",");
        let shell = user.shell.as_ref().map(|s| s.display().to_string());

        let mut args = Vec::new();
        if !groups.is_empty() {
            args.extend(["-a", "-G", groups.as_str()]);
        }
        if let Some(comment) = &user.comment {
            args.extend(["-c", comment.as_str()]);
        }
        if let Some(shell) = &shell {
            args.extend(["-s", shell.as_str()]);
        }
        args.push(user.name.as_str());

        run_checked("usermod", &args).with_context(|| format!("Failed to modify user {}", user.name))
    }

    fn run_command(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        run_shell(
            &spec.command,
            spec.cwd.as_deref(),
            spec.path.as_deref(),
            spec.timeout,
        )
    }

    fn start_service(&self, name: &str) -> Result<()> {
        self.service(name, "start")
    }

    fn stop_service(&self, name: &str) -> Result<()> {
        self.service(name, "stop")
    }

    fn enable_service(&self, name: &str) -> Result<()> {
        match self.services {
            ServiceManager::Systemd => self.service(name, "enable"),
            ServiceManager::SysV => run_checked("chkconfig", &[name, "on"])
                .with_context(|| format!("Failed to enable service {name}")),
        }
    }

    fn restart_service(&self, name: &str) -> Result<()> {
        self.service(name, "restart")
    }
}
