// ABOUTME: Pull command handler.
// ABOUTME: Refreshes credentials when due, then pulls one image with fallbacks.

use pullwarden::config::Config;
use pullwarden::diagnostics::{Diagnostics, Warning};
use pullwarden::error::Result;
use pullwarden::output::Output;
use pullwarden::pull::{PullOptions, SupportMode};
use pullwarden::types::ImageReference;
use serde::Serialize;

use super::services::{Services, report_diagnostics};

#[derive(Serialize)]
struct PullSummary {
    image: String,
    success: bool,
    is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
}

pub async fn pull(
    config: Config,
    image: &str,
    upstream: Option<&str>,
    allow_private_fallback: bool,
    platform: Option<String>,
    output: &mut Output,
) -> Result<bool> {
    let reference = ImageReference::parse(image)?;
    let upstream = upstream.map(ImageReference::parse).transpose()?;
    let services = Services::new(config);
    let mut diagnostics = Diagnostics::default();

    output.start_timer();
    let tokens = services.token_manager();
    let host = reference.registry_or_default().to_string();
    if let Err(e) = tokens.refresh_if_needed(&host).await {
        diagnostics.warn(Warning::token_refresh(&host, e));
    }

    let puller = services.puller(output, &mut diagnostics).await;
    let options = PullOptions {
        upstream,
        allow_private_fallback,
        platform,
    };

    output.progress(&format!("Pulling {reference}..."));
    let result = puller
        .pull_with_fallback(&reference, &options, &SupportMode::default())
        .await;
    tokens.record_use(&host);

    let summary = PullSummary {
        image: result.image.full_name(),
        success: result.success,
        is_fallback: result.is_fallback,
        strategy: result.strategy.map(|s| s.name()),
        error_type: result.error_type.map(|k| k.to_string()),
        error: result.last_error.clone(),
    };

    if result.success {
        let human = match result.strategy {
            Some(strategy) => format!("Pulled {} via {} fallback", result.image, strategy),
            None => format!("Pulled {}", result.image),
        };
        output.result("pulled", &human, &summary);
    } else {
        let kind = summary.error_type.as_deref().unwrap_or("unknown");
        output.result(
            "pull_failed",
            &format!("Failed to pull {reference} ({kind}): {}", result.last_error),
            &summary,
        );
    }

    report_diagnostics(output, &diagnostics);
    Ok(result.success)
}
