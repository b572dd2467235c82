//! System package resource

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceKey, ResourceState};
use crate::host::Host;

/// A package installed through the host's package backend
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    /// Exact version to install; any version satisfies when unset
    pub version: Option<String>,
    host: Host,
}

impl Package {
    pub fn new(name: &str, host: &Host) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            host: host.clone(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }
}

impl Resource for Package {
    fn key(&self) -> ResourceKey {
        ResourceKey::package(&self.name)
    }

    fn description(&self) -> String {
        match &self.version {
            Some(v) => format!("Install package {} {}", self.name, v),
            None => format!("Install package {}", self.name),
        }
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("ensure".into(), "present".into());
        if let Some(v) = &self.version {
            attrs.insert("version".into(), v.clone());
        }
        attrs
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self
            .host
            .probe
            .package_installed(&self.name, self.version.as_deref())?
        {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        self.host
            .backend
            .install_package(&self.name, self.version.as_deref())?;
        Ok(ApplyResult::Created)
    }
}
