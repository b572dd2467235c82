use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::paths;

/// POSIX-portable account name, as accepted by useradd/groupadd
static ACCOUNT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("valid account regex"));

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("valid version regex"));

// ============================================================================
// Provisioning Config Schema
// ============================================================================

/// Settings for the OpenResty resource set, read from `config.toml`
///
/// Every field has a default, so an empty or missing file yields the stock
/// `nginx`/`nginx` build of OpenResty 1.7.0.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Account the server runs as
    pub user: String,
    /// Group the server runs as
    pub group: String,
    pub user_comment: String,
    pub user_shell: PathBuf,

    /// OpenResty release to build
    pub version: String,
    /// Directory URL the release tarball is downloaded from
    pub download_base_url: String,
    /// Where the tarball is downloaded and unpacked
    pub build_dir: PathBuf,
    /// `--prefix` of the installed build
    pub prefix: PathBuf,
    /// `PATH` for every build command
    pub search_path: String,

    /// Package providing the download tool
    pub download_package: String,
    /// Packages needed to configure and compile
    pub build_packages: Vec<String>,
    /// Version pins for any of the packages above
    pub package_versions: BTreeMap<String, String>,

    pub service_name: String,
    /// Command run when the service is notified; defaults to an init-script reload
    pub restart_command: Option<String>,

    /// Wall-clock limit for each build command, in seconds
    pub exec_timeout_secs: Option<u64>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            user: "nginx".to_string(),
            group: "nginx".to_string(),
            user_comment: "nginx web server".to_string(),
            user_shell: PathBuf::from("/sbin/nologin"),
            version: "1.7.0.1".to_string(),
            download_base_url: "http://openresty.org/download".to_string(),
            build_dir: PathBuf::from("/tmp"),
            prefix: PathBuf::from("/usr/local/openresty"),
            search_path: "/sbin:/bin:/usr/bin".to_string(),
            download_package: "wget".to_string(),
            build_packages: ["perl", "gcc", "readline-devel", "pcre-devel", "openssl-devel"]
                .map(String::from)
                .to_vec(),
            package_versions: BTreeMap::new(),
            service_name: "nginx".to_string(),
            restart_command: None,
            exec_timeout_secs: None,
        }
    }
}

impl ProvisionConfig {
    /// Load from `path`, or from the default config file when `None`
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !path.exists() {
            if explicit {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides of the account names
    pub fn with_overrides(mut self, user: Option<&str>, group: Option<&str>) -> Result<Self> {
        if let Some(user) = user {
            self.user = user.to_string();
        }
        if let Some(group) = group {
            self.group = group.to_string();
        }
        self.validate()?;
        Ok(self)
    }

    fn expand_paths(&mut self) {
        for path in [&mut self.build_dir, &mut self.prefix, &mut self.user_shell] {
            *path = paths::expand(&path.to_string_lossy());
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [("user", &self.user), ("group", &self.group)] {
            if !ACCOUNT_NAME.is_match(name) {
                bail!("Invalid {field} name '{name}': expected a lowercase account name");
            }
        }
        if !VERSION.is_match(&self.version) {
            bail!("Invalid version '{}': expected dotted digits", self.version);
        }
        for (field, value) in [
            ("download_base_url", &self.download_base_url),
            ("search_path", &self.search_path),
            ("download_package", &self.download_package),
            ("service_name", &self.service_name),
        ] {
            if value.trim().is_empty() {
                bail!("{field} must not be empty");
            }
        }
        for (field, path) in [
            ("build_dir", &self.build_dir),
            ("prefix", &self.prefix),
            ("user_shell", &self.user_shell),
        ] {
            if !path.is_absolute() {
                bail!("{field} must be an absolute path, got {}", path.display());
            }
        }
        if let Some(pkg) = self.build_packages.iter().find(|p| p.trim().is_empty()) {
            bail!("build_packages contains an empty name: {pkg:?}");
        }
        if let Some((pkg, _)) = self.package_versions.iter().find(|(_, v)| v.trim().is_empty()) {
            bail!("package_versions has an empty version for {pkg}");
        }
        if self.exec_timeout_secs == Some(0) {
            bail!("exec_timeout_secs must be positive");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------------

    /// `ngx_openresty-<version>`
    pub fn source_name(&self) -> String {
        format!("ngx_openresty-{}", self.version)
    }

    pub fn tarball_name(&self) -> String {
        format!("{}.tar.gz", self.source_name())
    }

    pub fn tarball_url(&self) -> String {
        format!(
            "{}/{}",
            self.download_base_url.trim_end_matches('/'),
            self.tarball_name()
        )
    }

    pub fn tarball_path(&self) -> PathBuf {
        self.build_dir.join(self.tarball_name())
    }

    /// Unpacked source tree
    pub fn source_dir(&self) -> PathBuf {
        self.build_dir.join(self.source_name())
    }

    /// Installed server binary
    pub fn nginx_binary(&self) -> PathBuf {
        self.prefix.join("nginx").join("sbin").join("nginx")
    }

    pub fn package_version(&self, name: &str) -> Option<&str> {
        self.package_versions.get(name).map(String::as_str)
    }

    pub fn restart_command(&self) -> String {
        self.restart_command
            .clone()
            .unwrap_or_else(|| format!("/etc/init.d/{} reload", self.service_name))
    }

    pub fn exec_timeout(&self) -> Option<std::time::Duration> {
        self.exec_timeout_secs.map(std::time::Duration::from_secs)
    }
}
