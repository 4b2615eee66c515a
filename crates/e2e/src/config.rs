//! Environment configuration loaded from YAML

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cloudprobe_common::{AccountTier, ResourceKind};

use crate::error::{E2eError, E2eResult};
use crate::profile::{ProfileOverride, ResourceProfile};
use crate::ssh::SshSettings;

/// One console deployment under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Console landing page
    pub url: String,

    /// Region selected after login
    pub region: String,

    /// Tier the test account is expected to have
    #[serde(default)]
    pub tier: AccountTier,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-kind adjustments of the built-in profiles
    #[serde(default)]
    pub profiles: HashMap<ResourceKind, ProfileOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Run the remote verification commands
    pub validate: bool,
    /// `host:port` SOCKS proxy used to reach the bastions
    pub socks_proxy: Option<String>,
    pub key_path: PathBuf,
    pub config_path: PathBuf,
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            validate: true,
            socks_proxy: None,
            key_path: cloudprobe_common::default_key_path(),
            config_path: cloudprobe_common::default_ssh_config_path(),
            connect_timeout_secs: 12,
        }
    }
}

impl SshConfig {
    pub fn settings(&self) -> SshSettings {
        SshSettings {
            socks_proxy: self.socks_proxy.clone().filter(|p| !p.is_empty()),
            config_path: expand_home(&self.config_path),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn private_key(&self) -> PathBuf {
        expand_home(&self.key_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Instance type checkbox name offered to each tier
    pub instance_types: HashMap<AccountTier, String>,
    /// Login password of preview hosts, sent with `sshpass`
    pub password: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let icx = "checkBoxTable-Instancetype-grid-pre-bm-icx".to_string();
        let instance_types = [AccountTier::Standard, AccountTier::Premium, AccountTier::Enterprise]
            .into_iter()
            .map(|tier| (tier, icx.clone()))
            .collect();
        Self {
            instance_types,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub size_tb: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { size_tb: 1 }
    }
}

impl EnvironmentSpec {
    /// Parse an environment from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse an environment from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> E2eResult<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(E2eError::Config(format!("console url must be http(s): {}", self.url)));
        }
        if self.region.trim().is_empty() {
            return Err(E2eError::Config("region must not be empty".into()));
        }
        Ok(())
    }

    /// Built-in profile for a kind with this environment's overrides applied
    pub fn profile_for(&self, kind: ResourceKind) -> ResourceProfile {
        let mut profile = ResourceProfile::builtin(kind);
        if let Some(o) = self.profiles.get(&kind) {
            profile.apply(o);
        }
        profile
    }

    /// Same as [`Self::profile_for`], starting from a specific built-in
    pub fn customize(&self, mut profile: ResourceProfile) -> ResourceProfile {
        if let Some(o) = self.profiles.get(&profile.kind) {
            profile.apply(o);
        }
        profile
    }

    pub fn preview_instance_type(&self) -> E2eResult<&str> {
        self.preview
            .instance_types
            .get(&self.tier)
            .map(String::as_str)
            .ok_or_else(|| E2eError::Config(format!("no preview instance type for {} tier", self.tier)))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        Err(_) => path.to_path_buf(),
    }
}
