// ABOUTME: Configuration types and parsing for pullwarden.yml.
// ABOUTME: Every field has a default so a missing file is a valid configuration.

mod deserialize;
mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use deserialize::{deserialize_host, deserialize_hosts};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "pullwarden.yml";
pub const CONFIG_FILENAME_ALT: &str = "pullwarden.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".pullwarden/config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub registries: RegistriesConfig,
    pub tokens: TokenConfig,
    pub verification: VerificationConfig,
    pub remote: RemoteConfig,
    pub timeouts: TimeoutConfig,
    pub tools: ToolsConfig,
    pub checkpoint: CheckpointConfig,
}

/// Registry hosts and namespaces the resolver and token manager reason about.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistriesConfig {
    #[serde(deserialize_with = "deserialize_host")]
    pub vendor_domain: String,
    pub private_org: String,
    pub public_org: String,
    #[serde(deserialize_with = "deserialize_hosts")]
    pub cloud_hosts: Vec<String>,
    #[serde(deserialize_with = "deserialize_host")]
    pub artifact_suffix: String,
    #[serde(deserialize_with = "deserialize_host")]
    pub mirror_host: String,
    #[serde(deserialize_with = "deserialize_hosts")]
    pub mirror_sources: Vec<String>,
}

impl Default for RegistriesConfig {
    fn default() -> Self {
        Self {
            vendor_domain: "cgr.dev".to_string(),
            private_org: "chainguard-private".to_string(),
            public_org: "chainguard".to_string(),
            cloud_hosts: ["gcr.io", "us.gcr.io", "eu.gcr.io", "asia.gcr.io"]
                .map(String::from)
                .to_vec(),
            artifact_suffix: "pkg.dev".to_string(),
            mirror_host: "mirror.gcr.io".to_string(),
            mirror_sources: ["docker.io", "index.docker.io", "registry-1.docker.io"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl RegistriesConfig {
    pub fn is_vendor_host(&self, host: &str) -> bool {
        host.contains(&self.vendor_domain)
    }

    /// Hosts the runtime logs into after a cloud credential refresh.
    pub fn cloud_login_hosts(&self) -> Vec<String> {
        let mut hosts = self.cloud_hosts.clone();
        hosts.push(self.artifact_suffix.clone());
        hosts
    }

    pub fn is_cloud_host(&self, host: &str) -> bool {
        !host.contains(&self.mirror_host)
            && (self.cloud_hosts.iter().any(|h| host.contains(h.as_str()))
                || host.contains(&self.artifact_suffix))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub proactive_threshold: Duration,
    /// How long a host is left alone after a failed refresh.
    #[serde(with = "humantime_serde")]
    pub failure_cooldown: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(3600),
            proactive_threshold: Duration::from_secs(900),
            failure_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub cache_capacity: usize,
    pub prefer_metadata_api: bool,
    pub metadata_api_url: String,
    pub metadata_repo: String,
    pub metadata_token: EnvValue,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            prefer_metadata_api: true,
            metadata_api_url: "https://api.github.com".to_string(),
            metadata_repo: "chainguard-images/images-private".to_string(),
            metadata_token: EnvValue::from_env("GITHUB_TOKEN"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub concurrency: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://console-api.enforce.dev".to_string(),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "humantime_serde")]
    pub pull: Duration,
    #[serde(with = "humantime_serde")]
    pub inspect: Duration,
    #[serde(with = "humantime_serde")]
    pub auth: Duration,
    #[serde(with = "humantime_serde")]
    pub version_check: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            pull: Duration::from_secs(600),
            inspect: Duration::from_secs(30),
            auth: Duration::from_secs(60),
            version_check: Duration::from_secs(5),
        }
    }
}

/// External executables, resolved through PATH.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub runtime: String,
    pub tag_lister: String,
    pub vendor_cli: String,
    pub cloud_cli: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            tag_lister: "skopeo".to_string(),
            vendor_cli: "chainctl".to_string(),
            cloud_cli: "gcloud".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    pub flush_every: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".pullwarden_checkpoint.json"),
            flush_every: 25,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or the defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    fn validate(&self) -> Result<()> {
        if self.verification.cache_capacity == 0 {
            return Err(Error::InvalidConfig(
                "verification.cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.remote.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "remote.concurrency must be at least 1".to_string(),
            ));
        }
        if self.checkpoint.flush_every == 0 {
            return Err(Error::InvalidConfig(
                "checkpoint.flush_every must be at least 1".to_string(),
            ));
        }
        if self.tokens.proactive_threshold > self.tokens.refresh_interval {
            return Err(Error::InvalidConfig(
                "tokens.proactive_threshold cannot exceed tokens.refresh_interval".to_string(),
            ));
        }
        Ok(())
    }
}
