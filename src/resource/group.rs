//! Group account resource

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
use crate::host::{GroupSpec, Host};

/// A group account
///
/// `title` identifies the declaration (`Group[openresty group]`); `spec.name`
/// is the account name on the host.
#[derive(Debug, Clone)]
pub struct Group {
    pub title: String,
    pub spec: GroupSpec,
    host: Host,
}

impl Group {
    pub fn new(title: &str, name: &str, host: &Host) -> Self {
        Self {
            title: title.to_string(),
            spec: GroupSpec {
                name: name.to_string(),
            },
            host: host.clone(),
        }
    }
}

impl Resource for Group {
    fn key(&self) -> ResourceKey {
        ResourceKey::group(&self.title)
    }

    fn description(&self) -> String {
        format!("Create group {}", self.spec.name)
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("ensure".into(), "present".into());
        attrs.insert("name".into(), self.spec.name.clone());
        attrs
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.spec.name.trim().is_empty() {
            return Err("group name must not be empty".to_string());
        }
        Ok(())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.host.probe.group_exists(&self.spec)? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        self.host.backend.create_group(&self.spec)?;
        Ok(ApplyResult::Created)
    }
}
