// ABOUTME: Pulls an image through the container runtime, walking fallbacks on failure.
// ABOUTME: Auth failures only ever try the private namespace; other permanent failures stop immediately.

use std::sync::Arc;
use std::time::Duration;

use crate::process::CommandRunner;
use crate::types::ImageReference;

use super::{PullContext, PullResult, PullStrategy, PullStrategyResolver, SupportMode};

pub const DEFAULT_PLATFORM: &str = "linux/amd64";

const DIGEST_EXISTS: &str = "cannot overwrite digest";

#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub upstream: Option<ImageReference>,
    pub allow_private_fallback: bool,
    pub platform: Option<String>,
}

pub struct Puller {
    runner: Arc<dyn CommandRunner>,
    runtime: String,
    timeout: Duration,
    resolver: PullStrategyResolver,
}

impl Puller {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        runtime: impl Into<String>,
        timeout: Duration,
        resolver: PullStrategyResolver,
    ) -> Self {
        Self {
            runner,
            runtime: runtime.into(),
            timeout,
            resolver,
        }
    }

    /// One pull attempt. Returns the stderr on failure.
    pub async fn attempt_pull(&self, image: &ImageReference, platform: &str) -> Result<(), String> {
        let name = image.full_name();
        let result = self
            .runner
            .run(&self.runtime, &["pull", "--platform", platform, &name], self.timeout)
            .await;

        match result {
            Ok(output) if output.success => Ok(()),
            Ok(output) if output.stderr.to_lowercase().contains(DIGEST_EXISTS) => {
                tracing::debug!("{} already present locally", name);
                Ok(())
            }
            Ok(output) => Err(output.stderr),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Pull `image`, falling back through the strategy chain.
    ///
    /// `support` is a snapshot of the caller's support mode. A successful
    /// private fallback returns the change in `PullResult::delta`; the caller
    /// applies it.
    pub async fn pull_with_fallback(
        &self,
        image: &ImageReference,
        options: &PullOptions,
        support: &SupportMode,
    ) -> PullResult {
        let platform = options.platform.as_deref().unwrap_or(DEFAULT_PLATFORM);
        let env = self.resolver.env();

        if options.allow_private_fallback
            && let Some(org) = support.org()
            && let Some(private) = self.support_mode_image(image, org)
        {
            tracing::debug!("Support mode active: pulling {} directly", private);
            match self.attempt_pull(&private, platform).await {
                Ok(()) => return PullResult::fallback(private, PullStrategy::PrivateFallback, Default::default()),
                Err(stderr) => tracing::debug!("Private pull of {} failed: {}", private, stderr.trim()),
            }
        }

        tracing::debug!("Attempting to pull {}", image);
        let stderr = match self.attempt_pull(image, platform).await {
            Ok(()) => return PullResult::direct(image.clone()),
            Err(stderr) => stderr,
        };

        let mut ctx = PullContext::new(image.clone(), &stderr)
            .with_upstream(options.upstream.clone())
            .with_private_fallback(options.allow_private_fallback)
            .with_support_mode(support.clone());
        let is_auth_error = ctx.is_auth_error;
        let is_recoverable = ctx.is_recoverable;
        let mut last_stderr = stderr;

        if PullStrategy::PrivateFallback.can_apply(&ctx, env)
            && let Some(private) = PullStrategy::PrivateFallback.fallback_image(&ctx, env).await
        {
            tracing::warn!("Authentication failed for {}, trying {}", image, private);
            match self.attempt_pull(&private, platform).await {
                Ok(()) => {
                    let delta = PullStrategy::PrivateFallback.on_success(&ctx, env);
                    tracing::info!("Private namespace fallback succeeded: {} -> {}", image, private);
                    return PullResult::fallback(private, PullStrategy::PrivateFallback, delta);
                }
                Err(stderr) => {
                    tracing::debug!("Private namespace fallback failed: {}", stderr.trim());
                    ctx = ctx.next_attempt(&private, &stderr);
                    last_stderr = stderr;
                }
            }
        }

        if !is_recoverable && !(is_auth_error && options.upstream.is_some()) {
            if is_auth_error {
                let registry = image.registry_or_default();
                tracing::error!(
                    "Authentication required for {} ({}). Run: {} login {}",
                    image,
                    last_stderr.trim(),
                    self.runtime,
                    registry
                );
            } else {
                tracing::error!("Failed to pull {}: {}", image, last_stderr.trim());
            }
            return PullResult::failed(image.clone(), &last_stderr);
        }

        tracing::warn!("Pull of {} failed, trying fallback strategies", image);
        for _ in 0..PullStrategy::ORDER.len() {
            let Some(resolution) = self.resolver.resolve(&ctx).await else {
                break;
            };
            tracing::warn!("Trying {} fallback: {}", resolution.strategy, resolution.image);
            match self.attempt_pull(&resolution.image, platform).await {
                Ok(()) => {
                    tracing::info!(
                        "{} fallback succeeded: {} -> {}",
                        resolution.strategy,
                        image,
                        resolution.image
                    );
                    return PullResult::fallback(resolution.image, resolution.strategy, resolution.on_success);
                }
                Err(stderr) => {
                    tracing::debug!("{} fallback failed: {}", resolution.strategy, stderr.trim());
                    ctx = ctx.next_attempt(&resolution.image, &stderr);
                    last_stderr = stderr;
                }
            }
        }

        tracing::warn!("All fallback strategies failed for {}", image);
        PullResult::failed(image.clone(), &last_stderr)
    }

    fn support_mode_image(&self, image: &ImageReference, org: &str) -> Option<ImageReference> {
        let r = &self.resolver.env().registries;
        let reserved = [r.private_org.as_str(), r.public_org.as_str()];
        if image.vendor_org(&r.vendor_domain, &reserved) != Some(org) {
            return None;
        }
        image.to_private(&r.vendor_domain, &r.private_org, &r.public_org)
    }
}
