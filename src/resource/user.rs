//! User account resource

use anyhow::Result;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
use crate::host::{Host, UserSpec, UserState};

/// A user account with group membership, comment and login shell
#[derive(Debug, Clone)]
pub struct User {
    pub title: String,
    pub spec: UserSpec,
    host: Host,
}

impl User {
    pub fn new(title: &str, name: &str, host: &Host) -> Self {
        Self {
            title: title.to_string(),
            spec: UserSpec {
                name: name.to_string(),
                groups: Vec::new(),
                comment: None,
                shell: None,
                system: false,
            },
            host: host.clone(),
        }
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.spec.comment = Some(comment.to_string());
        self
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.spec.shell = Some(shell.into());
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.spec.system = system;
        self
    }
}

impl Resource for User {
    fn key(&self) -> ResourceKey {
        ResourceKey::user(&self.title)
    }

    fn description(&self) -> String {
        format!("Create user {}", self.spec.name)
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("ensure".into(), "present".into());
        attrs.insert("name".into(), self.spec.name.clone());
        if !self.spec.groups.is_empty() {
            attrs.insert("groups".into(), self.spec.groups.join(","));
        }
        if let Some(comment) = &self.spec.comment {
            attrs.insert("comment".into(), comment.clone());
        }
        if let Some(shell) = &self.spec.shell {
            attrs.insert("shell".into(), shell.display().to_string());
        }
        attrs.insert("system".into(), self.spec.system.to_string());
        attrs
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.spec.name.trim().is_empty() {
            return Err("user name must not be empty".to_string());
        }
        if self.spec.groups.iter().any(|g| g.trim().is_empty()) {
            return Err("group names must not be empty".to_string());
        }
        if let Some(shell) = &self.spec.shell
            && !shell.is_absolute()
        {
            return Err(format!("shell must be an absolute path, got {}", shell.display()));
        }
        Ok(())
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(match self.host.probe.user_state(&self.spec)? {
            UserState::Absent => ResourceState::Absent,
            UserState::Matches => ResourceState::Present { details: None },
            UserState::Differs(attrs) => ResourceState::Modified {
                from: format!("{} differs", attrs.join(", ")),
                to: "present".to_string(),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        let backend = &self.host.backend;
        match self.host.probe.user_state(&self.spec) {
            Ok(UserState::Matches) => Ok(ApplyResult::NoChange),
            Ok(UserState::Absent) => {
                backend.create_user(&self.spec)?;
                Ok(ApplyResult::Created)
            }
            Ok(UserState::Differs(_)) => {
                backend.modify_user(&self.spec)?;
                Ok(ApplyResult::Modified)
            }
            Err(e) => {
                log::warn!("{}: account unknown ({e:#}), creating or modifying", self.key());
                // A failed create usually means the account already exists
                match backend.create_user(&self.spec) {
                    Ok(()) => Ok(ApplyResult::Created),
                    Err(create) => match backend.modify_user(&self.spec) {
                        Ok(()) => Ok(ApplyResult::Modified),
                        Err(_) => Err(create),
                    },
                }
            }
        }
    }
}
