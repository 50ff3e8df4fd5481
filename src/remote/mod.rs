// ABOUTME: Authenticated client for the vulnerability-count API.
// ABOUTME: Retries only on HTTP 429; every other failure degrades to an empty result.

mod growth;

pub use growth::{CountSnapshot, GrowthRates, Severity, SeverityCount, VulnCounts, growth_rates};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{BearerTokenSource, CredentialError};
use crate::config::RemoteConfig;

/// Start of the default query window.
pub const DEFAULT_FROM: &str = "2024-01-01T00:00:00Z";

const COUNTS_PATH: &str = "/registry/v1/vuln_reports/counts";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("no API token: {0}")]
    Credential(#[from] CredentialError),
}

/// Waits between retries. Only the calling task sleeps.
#[async_trait]
pub trait Backoff: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackoff;

#[async_trait]
impl Backoff for TokioBackoff {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// `Retry-After` seconds when present and sane, else `base * 2^attempt`.
pub fn retry_delay(attempt: u32, retry_after: Option<&str>, base: Duration) -> Duration {
    if let Some(secs) = retry_after
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
    {
        return Duration::from_secs_f64(secs);
    }
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// One pooled HTTP client shared by every worker of a batch.
pub struct VulnApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn BearerTokenSource>,
    backoff: Arc<dyn Backoff>,
    max_retries: u32,
    base_delay: Duration,
}

impl VulnApiClient {
    pub fn new(config: &RemoteConfig, tokens: Arc<dyn BearerTokenSource>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("pullwarden/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            backoff: Arc::new(TokioBackoff),
            max_retries: config.max_retries,
            base_delay: config.base_delay,
        })
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Historical counts for `repo:tag` between `from` (default 2024-01-01) and `to` (default now).
    ///
    /// Only a missing credential is an error. HTTP failures return an empty result.
    pub async fn get_vulnerability_counts(
        &self,
        repo: &str,
        tag: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<VulnCounts, RemoteError> {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let from = from.unwrap_or(DEFAULT_FROM);
        let to = to.unwrap_or(now.as_str());
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}{}", self.base_url, COUNTS_PATH);

        let mut attempt = 0;
        loop {
            let result = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("repo", repo), ("tag", tag), ("from", from), ("to", to)])
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    tracing::warn!("Timeout fetching vulnerability data for {}:{}", repo, tag);
                    return Ok(VulnCounts::empty());
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch vulnerability data for {}:{}: {}", repo, tag, e);
                    return Ok(VulnCounts::empty());
                }
            };

            match response.status() {
                status if status.is_success() => {
                    return Ok(response.json().await.unwrap_or_else(|e| {
                        tracing::warn!("Unreadable vulnerability data for {}:{}: {}", repo, tag, e);
                        VulnCounts::empty()
                    }));
                }
                StatusCode::TOO_MANY_REQUESTS if attempt < self.max_retries => {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok());
                    let delay = retry_delay(attempt, retry_after, self.base_delay);
                    tracing::debug!(
                        "Rate limited for {}:{}, retrying in {:.1}s (attempt {}/{})",
                        repo,
                        tag,
                        delay.as_secs_f64(),
                        attempt + 1,
                        self.max_retries
                    );
                    self.backoff.sleep(delay).await;
                    attempt += 1;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::warn!(
                        "Rate limit exceeded for {}:{} after {} retries",
                        repo,
                        tag,
                        self.max_retries
                    );
                    return Ok(VulnCounts::empty());
                }
                StatusCode::FORBIDDEN => {
                    tracing::debug!("No vulnerability data available for {}:{} (403)", repo, tag);
                    return Ok(VulnCounts::empty());
                }
                status => {
                    tracing::warn!("HTTP {} fetching vulnerability data for {}:{}", status, repo, tag);
                    return Ok(VulnCounts::empty());
                }
            }
        }
    }

    /// Monthly growth ratio per severity, `None` when there is no data.
    pub async fn calculate_growth_rate(&self, repo: &str, tag: &str) -> Result<Option<GrowthRates>, RemoteError> {
        let counts = self.get_vulnerability_counts(repo, tag, None, None).await?;
        Ok(growth_rates(&counts.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_without_header() {
        let base = Duration::from_secs(1);
        assert_eq!(retry_delay(0, None, base), Duration::from_secs(1));
        assert_eq!(retry_delay(1, None, base), Duration::from_secs(2));
        assert_eq!(retry_delay(2, None, base), Duration::from_secs(4));
    }

    #[test]
    fn header_overrides_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(retry_delay(2, Some("5"), base), Duration::from_secs(5));
        assert_eq!(retry_delay(0, Some("0.5"), base), Duration::from_millis(500));
    }

    #[test]
    fn unparseable_header_falls_back() {
        let base = Duration::from_secs(1);
        assert_eq!(
            retry_delay(1, Some("Wed, 21 Oct 2015 07:28:00 GMT"), base),
            Duration::from_secs(2)
        );
        assert_eq!(retry_delay(1, Some("-3"), base), Duration::from_secs(2));
    }
}
