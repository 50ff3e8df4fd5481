// ABOUTME: The closed set of pull fallback strategies, evaluated in a fixed order.
// ABOUTME: Also hosts tag discovery through a registry introspection tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RegistriesConfig;
use crate::process::{CommandRunner, ProcessError};
use crate::types::ImageReference;

use super::{PullContext, StateDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullStrategy {
    /// Auth failure on a vendor org image: retry from the vendor's private namespace.
    PrivateFallback,
    /// A previously discovered upstream equivalent.
    Upstream,
    /// Public mirror for default-registry images.
    Mirror,
    /// Same repository at `:latest`.
    LatestTag,
    /// Most recent tag found by listing the repository's tags.
    MostRecentTag,
}

impl PullStrategy {
    /// Evaluation order. The first applicable strategy wins.
    pub const ORDER: [PullStrategy; 5] = [
        PullStrategy::PrivateFallback,
        PullStrategy::Upstream,
        PullStrategy::Mirror,
        PullStrategy::LatestTag,
        PullStrategy::MostRecentTag,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PullStrategy::PrivateFallback => "private-namespace",
            PullStrategy::Upstream => "upstream",
            PullStrategy::Mirror => "mirror",
            PullStrategy::LatestTag => ":latest tag",
            PullStrategy::MostRecentTag => "most-recent tag",
        }
    }

    pub fn can_apply(&self, ctx: &PullContext, env: &StrategyEnv) -> bool {
        let image = &ctx.original;
        match self {
            PullStrategy::PrivateFallback => {
                ctx.is_auth_error && ctx.allow_private_fallback && env.private_image(image).is_some()
            }
            PullStrategy::Upstream => ctx.upstream.is_some(),
            PullStrategy::Mirror => ctx.is_recoverable && env.mirror_image(image).is_some(),
            PullStrategy::LatestTag => latest_image(image).is_some(),
            PullStrategy::MostRecentTag => env.tag_lister.is_some() && image.digest().is_none(),
        }
    }

    pub async fn fallback_image(&self, ctx: &PullContext, env: &StrategyEnv) -> Option<ImageReference> {
        let image = &ctx.original;
        match self {
            PullStrategy::PrivateFallback => env.private_image(image),
            PullStrategy::Upstream => ctx.upstream.clone(),
            PullStrategy::Mirror => env.mirror_image(image),
            PullStrategy::LatestTag => latest_image(image),
            PullStrategy::MostRecentTag => {
                let lister = env.tag_lister.as_ref()?;
                match lister.list_tags(image).await {
                    Ok(tags) => pick_most_recent_tag(&tags).map(|tag| image.with_tag(&tag)),
                    Err(e) => {
                        tracing::debug!("Tag discovery failed for {}: {}", image.repository(), e);
                        None
                    }
                }
            }
        }
    }

    /// State change to apply if the fallback image pulls successfully.
    pub fn on_success(&self, ctx: &PullContext, env: &StrategyEnv) -> StateDelta {
        if *self != PullStrategy::PrivateFallback || ctx.support_mode.detected() {
            return StateDelta::default();
        }
        let r = &env.registries;
        let reserved = [r.private_org.as_str(), r.public_org.as_str()];
        match ctx.original.vendor_org(&r.vendor_domain, &reserved) {
            Some(org) => StateDelta::support_mode(org),
            None => StateDelta::default(),
        }
    }
}

impl fmt::Display for PullStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the strategies need to know about the registry landscape.
#[derive(Clone)]
pub struct StrategyEnv {
    pub registries: RegistriesConfig,
    pub tag_lister: Option<Arc<dyn TagLister>>,
}

impl StrategyEnv {
    pub fn new(registries: RegistriesConfig) -> Self {
        Self {
            registries,
            tag_lister: None,
        }
    }

    pub fn with_tag_lister(mut self, lister: Arc<dyn TagLister>) -> Self {
        self.tag_lister = Some(lister);
        self
    }

    pub fn private_image(&self, image: &ImageReference) -> Option<ImageReference> {
        let r = &self.registries;
        image.to_private(&r.vendor_domain, &r.private_org, &r.public_org)
    }

    /// `nginx:1` becomes `<mirror>/library/nginx:1`; `user/app:1` becomes `<mirror>/user/app:1`.
    pub fn mirror_image(&self, image: &ImageReference) -> Option<ImageReference> {
        if image.digest().is_some() || !image.is_default_registry(&self.registries.mirror_sources) {
            return None;
        }
        let org = image.organization().unwrap_or("library");
        Some(image.with_registry(&self.registries.mirror_host, Some(org)))
    }
}

fn latest_image(image: &ImageReference) -> Option<ImageReference> {
    match (image.tag(), image.digest()) {
        (Some(tag), None) if tag != "latest" => Some(image.with_tag("latest")),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TagListError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("tag listing failed: {0}")]
    Failed(String),

    #[error("unreadable tag list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lists the tags available for an image's repository.
#[async_trait]
pub trait TagLister: Send + Sync {
    async fn list_tags(&self, image: &ImageReference) -> Result<Vec<String>, TagListError>;
}

/// Lists tags with `skopeo list-tags docker://<repository>`.
pub struct SkopeoTagLister {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

impl SkopeoTagLister {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TagLister for SkopeoTagLister {
    async fn list_tags(&self, image: &ImageReference) -> Result<Vec<String>, TagListError> {
        let target = format!("docker://{}", image.qualified_repository());
        let output = self
            .runner
            .run(&self.program, &["list-tags", &target], self.timeout)
            .await?;
        if !output.success {
            return Err(TagListError::Failed(output.stderr.trim().to_string()));
        }
        let list: TagList = serde_json::from_str(&output.stdout)?;
        Ok(list.tags)
    }
}

/// `latest`, `main`, `master`, else the highest numeric version tag.
pub fn pick_most_recent_tag(tags: &[String]) -> Option<String> {
    for preferred in ["latest", "main", "master"] {
        if tags.iter().any(|t| t == preferred) {
            return Some(preferred.to_string());
        }
    }

    let mut best: Option<(Vec<u64>, &String)> = None;
    for tag in tags {
        let Some(version) = parse_version(tag) else {
            continue;
        };
        if best.as_ref().is_none_or(|(current, _)| version > *current) {
            best = Some((version, tag));
        }
    }
    best.map(|(_, tag)| tag.clone())
}

/// Parses `v?\d+(\.\d+)*`.
fn parse_version(tag: &str) -> Option<Vec<u64>> {
    let digits = tag.strip_prefix('v').unwrap_or(tag);
    digits
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}
