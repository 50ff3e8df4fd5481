// ABOUTME: The two existence-check tiers: a metadata API lookup and a registry manifest inspection.
// ABOUTME: Both are traits so the service can be exercised without network or runtime.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::process::{CommandRunner, ProcessError};
use crate::types::ImageReference;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Fast tier: does the vendor's image catalogue list this image name?
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn image_exists(&self, image_name: &str) -> Result<bool, SourceError>;
}

/// Slow tier: can the registry produce a manifest for this exact reference?
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn manifest_exists(&self, image: &ImageReference) -> Result<bool, SourceError>;
}

/// Looks up `images/<name>/metadata.yaml` in a repository through the GitHub contents API.
pub struct GithubMetadataSource {
    client: reqwest::Client,
    base_url: String,
    repo: String,
    token: Option<String>,
}

impl GithubMetadataSource {
    pub fn new(
        base_url: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pullwarden/", env!("CARGO_PKG_VERSION")))
            .build()?;
        if token.is_none() {
            tracing::warn!(
                "No GITHUB_TOKEN set; the metadata API is heavily rate limited for unauthenticated requests"
            );
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            token,
        })
    }

    fn url(&self, image_name: &str) -> String {
        format!(
            "{}/repos/{}/contents/images/{}/metadata.yaml",
            self.base_url, self.repo, image_name
        )
    }
}

#[async_trait]
impl MetadataSource for GithubMetadataSource {
    async fn image_exists(&self, image_name: &str) -> Result<bool, SourceError> {
        let url = self.url(image_name);
        tracing::debug!("Checking image metadata at {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3.raw");
        if let Some(ref token) = self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SourceError::Status(status)),
        }
    }
}

/// Runs `<runtime> manifest inspect <image>`.
pub struct RuntimeManifestSource {
    runner: Arc<dyn CommandRunner>,
    runtime: String,
    timeout: Duration,
}

impl RuntimeManifestSource {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            runtime: runtime.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ManifestSource for RuntimeManifestSource {
    async fn manifest_exists(&self, image: &ImageReference) -> Result<bool, SourceError> {
        let name = image.full_name();
        let output = self
            .runner
            .run(&self.runtime, &["manifest", "inspect", &name], self.timeout)
            .await?;
        if !output.success {
            tracing::debug!("manifest inspect {} failed: {}", name, output.stderr.trim());
        }
        Ok(output.success)
    }
}
