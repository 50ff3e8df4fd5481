// ABOUTME: Verify command handler.
// ABOUTME: Checks a vendor image through the metadata API and manifest tiers.

use pullwarden::config::Config;
use pullwarden::error::Result;
use pullwarden::output::Output;
use pullwarden::types::ImageReference;
use pullwarden::verify::{
    GithubMetadataSource, ImageVerificationService, MetadataSource, RuntimeManifestSource,
};
use serde::Serialize;
use std::sync::Arc;

use super::services::Services;

#[derive(Serialize)]
struct Verification<'a> {
    image: &'a str,
    exists: bool,
}

pub async fn verify(config: Config, image: &str, no_metadata_api: bool, output: &Output) -> Result<()> {
    let reference = ImageReference::parse(image)?;
    let services = Services::new(config);
    let config = &services.config;
    let prefer_metadata = config.verification.prefer_metadata_api && !no_metadata_api;

    let metadata: Option<Arc<dyn MetadataSource>> = if prefer_metadata {
        match GithubMetadataSource::new(
            &config.verification.metadata_api_url,
            &config.verification.metadata_repo,
            config.verification.metadata_token.resolve_optional(),
            config.timeouts.inspect,
        ) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                tracing::warn!("Metadata API unavailable, using manifests only: {}", e);
                None
            }
        }
    } else {
        None
    };

    let manifest = Arc::new(RuntimeManifestSource::new(
        services.runner.clone(),
        &config.tools.runtime,
        config.timeouts.inspect,
    ));
    let service = ImageVerificationService::new(
        &config.registries.vendor_domain,
        metadata,
        manifest,
        config.verification.cache_capacity,
    );

    output.progress(&format!("Verifying {reference}..."));
    let exists = service.verify_image_exists(&reference, prefer_metadata).await;
    let human = if exists {
        format!("{reference} exists")
    } else {
        format!("{reference} could not be verified")
    };
    output.result(
        "verified",
        &human,
        &Verification {
            image,
            exists,
        },
    );
    Ok(())
}
