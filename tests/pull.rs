// ABOUTME: Integration tests for pulls with fallback strategies.
// ABOUTME: Drives the Puller against a scripted runner instead of a real container runtime.

mod support;

use pullwarden::classify::FailureKind;
use pullwarden::config::RegistriesConfig;
use pullwarden::pull::*;
use pullwarden::types::ImageReference;
use std::sync::Arc;
use std::time::Duration;
use support::FakeRunner;

fn image(s: &str) -> ImageReference {
    ImageReference::parse(s).unwrap()
}

/// Needle matching `docker pull --platform linux/amd64 <image>` exactly at the image.
fn pull_of(image: &str) -> String {
    format!("{DEFAULT_PLATFORM} {image}")
}

fn puller(runner: Arc<FakeRunner>, env: StrategyEnv) -> Puller {
    Puller::new(
        runner,
        "docker",
        Duration::from_secs(5),
        PullStrategyResolver::new(env),
    )
}

fn default_env() -> StrategyEnv {
    StrategyEnv::new(RegistriesConfig::default())
}

mod resolution_order {
    use super::*;

    #[tokio::test]
    async fn private_fallback_beats_mirror() {
        // A vendor host listed as a mirror source makes both strategies eligible.
        let mut registries = RegistriesConfig::default();
        registries.mirror_sources.push("cgr.dev".to_string());
        let resolver = PullStrategyResolver::new(StrategyEnv::new(registries));

        let mut ctx = PullContext::new(image("cgr.dev/acme.com/node:20"), "unauthorized")
            .with_private_fallback(true);
        ctx.is_recoverable = true;

        let resolution = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(resolution.strategy, PullStrategy::PrivateFallback);
        assert_eq!(resolution.image.full_name(), "cgr.dev/chainguard-private/node:20");
        assert_eq!(
            resolution.on_success,
            StateDelta::support_mode("acme.com")
        );
    }

    #[tokio::test]
    async fn upstream_beats_mirror() {
        let resolver = PullStrategyResolver::new(default_env());
        let ctx = PullContext::new(image("nginx:1.25"), "manifest unknown")
            .with_upstream(Some(image("ghcr.io/nginx/nginx:1.25")));

        let resolution = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(resolution.strategy, PullStrategy::Upstream);
        assert!(resolution.on_success.is_empty());
    }

    #[tokio::test]
    async fn attempted_images_are_skipped() {
        let resolver = PullStrategyResolver::new(default_env());
        let ctx = PullContext::new(image("nginx:1.25"), "manifest unknown");
        let mirror = image("mirror.gcr.io/library/nginx:1.25");
        let ctx = ctx.next_attempt(&mirror, "manifest unknown");

        let resolution = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(resolution.strategy, PullStrategy::LatestTag);
        assert_eq!(resolution.image.full_name(), "nginx:latest");
    }

    #[tokio::test]
    async fn nothing_applies_to_a_pinned_digest() {
        let resolver = PullStrategyResolver::new(default_env());
        let ctx = PullContext::new(image("nginx@sha256:abc"), "manifest unknown");
        assert!(resolver.resolve(&ctx).await.is_none());
    }
}

mod puller_flows {
    use super::*;

    #[tokio::test]
    async fn direct_success_uses_no_fallback() {
        support::init_tracing();
        let runner = Arc::new(FakeRunner::new());
        runner.succeed(&pull_of("nginx:1.25"), "");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("nginx:1.25"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(result.success);
        assert!(!result.is_fallback);
        assert!(result.strategy.is_none());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_docker_hub_tag_falls_back_to_mirror() {
        support::init_tracing();
        let runner = Arc::new(FakeRunner::new());
        runner.fail(
            &pull_of("docker.io/library/nginx:doesnotexist"),
            "Error response from daemon: manifest for nginx:doesnotexist not found: manifest unknown",
        );
        runner.succeed(&pull_of("mirror.gcr.io/library/nginx:doesnotexist"), "");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(
                &image("docker.io/library/nginx:doesnotexist"),
                &PullOptions::default(),
                &SupportMode::default(),
            )
            .await;

        assert!(result.success);
        assert!(result.is_fallback);
        assert_eq!(result.strategy, Some(PullStrategy::Mirror));
        assert_eq!(result.image.full_name(), "mirror.gcr.io/library/nginx:doesnotexist");
    }

    #[tokio::test]
    async fn digest_already_present_counts_as_success() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(
            &pull_of("nginx:1.25"),
            "Error: cannot overwrite digest sha256:abc",
        );

        let result = puller(runner, default_env())
            .pull_with_fallback(&image("nginx:1.25"), &PullOptions::default(), &SupportMode::default())
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn auth_failure_without_alternatives_stops_immediately() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("ghcr.io/acme/private:1"), "unauthorized: authentication required");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("ghcr.io/acme/private:1"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_type, Some(FailureKind::Auth));
        assert_eq!(runner.calls().len(), 1, "no fallback may run after an auth failure");
    }

    #[tokio::test]
    async fn auth_failure_with_upstream_tries_upstream() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("cgr.dev/chainguard/node:20"), "403 Forbidden");
        runner.succeed(&pull_of("node:20"), "");

        let options = PullOptions {
            upstream: Some(image("node:20")),
            ..PullOptions::default()
        };
        let result = puller(runner, default_env())
            .pull_with_fallback(&image("cgr.dev/chainguard/node:20"), &options, &SupportMode::default())
            .await;

        assert!(result.success);
        assert_eq!(result.strategy, Some(PullStrategy::Upstream));
    }

    #[tokio::test]
    async fn unknown_failure_is_permanent() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("nginx:1.25"), "no space left on device");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("nginx:1.25"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_type, Some(FailureKind::Unknown));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_last_error_and_tries_each_image_once() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("nginx:1.25"), "manifest unknown");
        runner.fail(&pull_of("mirror.gcr.io/library/nginx:1.25"), "toomanyrequests");
        runner.fail(&pull_of("nginx:latest"), "dial tcp: connection refused");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("nginx:1.25"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.last_error, "dial tcp: connection refused");
        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        let unique: std::collections::HashSet<_> = calls.iter().collect();
        assert_eq!(unique.len(), calls.len());
    }

    #[tokio::test]
    async fn most_recent_tag_comes_from_tag_listing() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("ghcr.io/acme/app:v0.9"), "manifest unknown");
        runner.fail(&pull_of("ghcr.io/acme/app:latest"), "manifest unknown");
        runner.succeed(
            "list-tags docker://ghcr.io/acme/app",
            r#"{"Repository":"ghcr.io/acme/app","Tags":["v1.2.0","v1.10.0","sha-abc"]}"#,
        );
        runner.succeed(&pull_of("ghcr.io/acme/app:v1.10.0"), "");

        let lister = SkopeoTagLister::new(runner.clone(), "skopeo", Duration::from_secs(5));
        let env = default_env().with_tag_lister(Arc::new(lister));

        let result = puller(runner.clone(), env)
            .pull_with_fallback(&image("ghcr.io/acme/app:v0.9"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(result.success);
        assert_eq!(result.strategy, Some(PullStrategy::MostRecentTag));
        assert_eq!(result.image.full_name(), "ghcr.io/acme/app:v1.10.0");
    }
}

mod support_mode {
    use super::*;

    #[tokio::test]
    async fn private_fallback_success_returns_support_delta() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("cgr.dev/acme.com/node:20"), "unauthorized");
        runner.succeed(&pull_of("cgr.dev/chainguard-private/node:20"), "");

        let options = PullOptions {
            allow_private_fallback: true,
            ..PullOptions::default()
        };
        let result = puller(runner, default_env())
            .pull_with_fallback(&image("cgr.dev/acme.com/node:20"), &options, &SupportMode::default())
            .await;

        assert!(result.success);
        assert_eq!(result.strategy, Some(PullStrategy::PrivateFallback));
        assert!(result.triggered_support_mode());

        let mut support = SupportMode::default();
        assert!(support.apply(&result.delta));
        assert!(support.is_active_for("acme.com"));
        assert!(!support.apply(&StateDelta::support_mode("other.org")));
    }

    #[tokio::test]
    async fn active_support_mode_skips_the_public_pull() {
        let runner = Arc::new(FakeRunner::new());
        runner.succeed(&pull_of("cgr.dev/chainguard-private/python:3.12"), "");

        let mut support = SupportMode::default();
        support.apply(&StateDelta::support_mode("acme.com"));
        let options = PullOptions {
            allow_private_fallback: true,
            ..PullOptions::default()
        };

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("cgr.dev/acme.com/python:3.12"), &options, &support)
            .await;

        assert!(result.success);
        assert!(!result.triggered_support_mode());
        assert_eq!(runner.calls().len(), 1);
        assert!(runner.calls()[0].contains("chainguard-private"));
    }

    #[tokio::test]
    async fn private_fallback_needs_opt_in() {
        let runner = Arc::new(FakeRunner::new());
        runner.fail(&pull_of("cgr.dev/acme.com/node:20"), "unauthorized");
        runner.succeed(&pull_of("cgr.dev/chainguard-private/node:20"), "");

        let result = puller(runner.clone(), default_env())
            .pull_with_fallback(&image("cgr.dev/acme.com/node:20"), &PullOptions::default(), &SupportMode::default())
            .await;

        assert!(!result.success);
        assert!(runner.calls_matching("chainguard-private").is_empty());
    }
}
