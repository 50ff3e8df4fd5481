// ABOUTME: Config scaffolding for new scan workspaces.
// ABOUTME: Writes a commented pullwarden.yml listing every default.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::default());
    std::fs::write(&config_path, yaml)?;

    Ok(config_path)
}

fn generate_template_yaml(config: &Config) -> String {
    let r = &config.registries;
    format!(
        r#"registries:
  vendor_domain: {}
  private_org: {}
  public_org: {}
  cloud_hosts: [{}]
  artifact_suffix: {}
  mirror_host: {}
  mirror_sources: [{}]

tokens:
  refresh_interval: {}
  proactive_threshold: {}
  failure_cooldown: {}

verification:
  cache_capacity: {}
  prefer_metadata_api: {}
  metadata_api_url: {}
  metadata_repo: {}
  # Token for the metadata API, read from the environment
  metadata_token:
    env: GITHUB_TOKEN

remote:
  base_url: {}
  max_retries: {}
  base_delay: {}
  request_timeout: {}
  concurrency: {}

timeouts:
  pull: {}
  inspect: {}
  auth: {}
  version_check: {}

tools:
  runtime: {}
  tag_lister: {}
  vendor_cli: {}
  cloud_cli: {}

checkpoint:
  path: {}
  flush_every: {}
"#,
        r.vendor_domain,
        r.private_org,
        r.public_org,
        r.cloud_hosts.join(", "),
        r.artifact_suffix,
        r.mirror_host,
        r.mirror_sources.join(", "),
        secs(config.tokens.refresh_interval),
        secs(config.tokens.proactive_threshold),
        secs(config.tokens.failure_cooldown),
        config.verification.cache_capacity,
        config.verification.prefer_metadata_api,
        config.verification.metadata_api_url,
        config.verification.metadata_repo,
        config.remote.base_url,
        config.remote.max_retries,
        secs(config.remote.base_delay),
        secs(config.remote.request_timeout),
        config.remote.concurrency,
        secs(config.timeouts.pull),
        secs(config.timeouts.inspect),
        secs(config.timeouts.auth),
        secs(config.timeouts.version_check),
        config.tools.runtime,
        config.tools.tag_lister,
        config.tools.vendor_cli,
        config.tools.cloud_cli,
        config.checkpoint.path.display(),
        config.checkpoint.flush_every,
    )
}

fn secs(duration: std::time::Duration) -> String {
    format!("{}s", duration.as_secs())
}
