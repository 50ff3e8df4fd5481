// ABOUTME: Vendor image existence checks with an LRU cache in front of two lookup tiers.
// ABOUTME: Tier failures degrade to "not verified"; every outcome, negative ones included, is cached.

mod lru;
mod sources;

pub use lru::LruCache;
pub use sources::{
    GithubMetadataSource, ManifestSource, MetadataSource, RuntimeManifestSource, SourceError,
};

use parking_lot::Mutex;
use std::sync::Arc;

use crate::types::ImageReference;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

pub struct ImageVerificationService {
    vendor_domain: String,
    metadata: Option<Arc<dyn MetadataSource>>,
    manifest: Arc<dyn ManifestSource>,
    cache: Mutex<LruCache<String, bool>>,
}

impl ImageVerificationService {
    pub fn new(
        vendor_domain: impl Into<String>,
        metadata: Option<Arc<dyn MetadataSource>>,
        manifest: Arc<dyn ManifestSource>,
        capacity: usize,
    ) -> Self {
        Self {
            vendor_domain: vendor_domain.into(),
            metadata,
            manifest,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn verify_image_exists(&self, image: &ImageReference, prefer_metadata_api: bool) -> bool {
        let key = image.full_name();
        if let Some(hit) = self.cache.lock().get(&key) {
            tracing::debug!("Verification cache hit for {}", key);
            return hit;
        }

        if !image.is_vendor(&self.vendor_domain) {
            tracing::debug!("{} is outside {}, not verifying", key, self.vendor_domain);
            self.remember(key, false);
            return false;
        }

        if prefer_metadata_api
            && let Some(ref metadata) = self.metadata
        {
            let image_name = image.name().rsplit('/').next().unwrap_or(image.name());
            match metadata.image_exists(image_name).await {
                Ok(true) => {
                    tracing::debug!("Metadata API confirmed {}", image_name);
                    self.remember(key, true);
                    return true;
                }
                Ok(false) => tracing::debug!("No metadata for {}", image_name),
                Err(e) => tracing::debug!("Metadata lookup for {} failed: {}", image_name, e),
            }
        }

        let exists = match self.manifest.manifest_exists(image).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!("Manifest check for {} failed: {}", key, e);
                false
            }
        };
        self.remember(key, exists);
        exists
    }

    fn remember(&self, key: String, exists: bool) {
        if let Some(evicted) = self.cache.lock().put(key, exists) {
            tracing::debug!("Verification cache evicted {}", evicted);
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}
