// ABOUTME: Snapshot types passed into and out of pull fallback resolution.
// ABOUTME: Support mode changes flow back to the caller as explicit state deltas.

use std::collections::HashSet;

use crate::classify::{self, FailureKind};
use crate::types::ImageReference;

use super::PullStrategy;

/// Immutable view of one failed pull, handed to the resolver.
#[derive(Debug, Clone)]
pub struct PullContext {
    pub original: ImageReference,
    pub last_error: String,
    pub is_auth_error: bool,
    pub is_recoverable: bool,
    pub upstream: Option<ImageReference>,
    pub allow_private_fallback: bool,
    pub support_mode: SupportMode,
    /// Full names already tried for this image, including the original.
    pub attempted: HashSet<String>,
}

impl PullContext {
    pub fn new(original: ImageReference, stderr: &str) -> Self {
        let mut attempted = HashSet::new();
        attempted.insert(original.full_name());
        Self {
            last_error: stderr.to_string(),
            is_auth_error: classify::is_auth_error(stderr),
            is_recoverable: classify::is_recoverable(stderr),
            original,
            upstream: None,
            allow_private_fallback: false,
            support_mode: SupportMode::default(),
            attempted,
        }
    }

    pub fn with_upstream(mut self, upstream: Option<ImageReference>) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_private_fallback(mut self, allow: bool) -> Self {
        self.allow_private_fallback = allow;
        self
    }

    pub fn with_support_mode(mut self, support_mode: SupportMode) -> Self {
        self.support_mode = support_mode;
        self
    }

    /// Context for re-entering the resolver after `image` failed with `stderr`.
    pub fn next_attempt(&self, image: &ImageReference, stderr: &str) -> Self {
        let mut next = self.clone();
        next.attempted.insert(image.full_name());
        next.last_error = stderr.to_string();
        next.is_auth_error = classify::is_auth_error(stderr);
        next.is_recoverable = classify::is_recoverable(stderr);
        next
    }

    pub fn was_attempted(&self, image: &ImageReference) -> bool {
        self.attempted.contains(&image.full_name())
    }
}

/// Per-organization session flag: after one successful private fallback,
/// images of that organization go straight to the private namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportMode {
    org: Option<String>,
}

impl SupportMode {
    pub fn detected(&self) -> bool {
        self.org.is_some()
    }

    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn is_active_for(&self, org: &str) -> bool {
        self.org.as_deref() == Some(org)
    }

    /// Apply a delta returned by a successful resolution. Returns true when the state changed.
    pub fn apply(&mut self, delta: &StateDelta) -> bool {
        match (&self.org, &delta.enable_support_mode) {
            (None, Some(org)) => {
                tracing::info!(
                    "Support mode detected: using the private namespace directly for '{}' images",
                    org
                );
                self.org = Some(org.clone());
                true
            }
            _ => false,
        }
    }
}

/// State change produced by a fallback, applied by the caller only if the pull succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub enable_support_mode: Option<String>,
}

impl StateDelta {
    pub fn support_mode(org: impl Into<String>) -> Self {
        Self {
            enable_support_mode: Some(org.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enable_support_mode.is_none()
    }
}

/// Terminal outcome of pulling one image with fallbacks.
#[derive(Debug, Clone)]
pub struct PullResult {
    pub success: bool,
    /// The image actually pulled, or the original on failure.
    pub image: ImageReference,
    pub is_fallback: bool,
    /// `None` on success.
    pub error_type: Option<FailureKind>,
    pub strategy: Option<PullStrategy>,
    pub delta: StateDelta,
    pub last_error: String,
}

impl PullResult {
    pub fn direct(image: ImageReference) -> Self {
        Self {
            success: true,
            image,
            is_fallback: false,
            error_type: None,
            strategy: None,
            delta: StateDelta::default(),
            last_error: String::new(),
        }
    }

    pub fn fallback(image: ImageReference, strategy: PullStrategy, delta: StateDelta) -> Self {
        Self {
            success: true,
            image,
            is_fallback: true,
            error_type: None,
            strategy: Some(strategy),
            delta,
            last_error: String::new(),
        }
    }

    pub fn failed(image: ImageReference, stderr: &str) -> Self {
        Self {
            success: false,
            image,
            is_fallback: false,
            error_type: Some(classify::classify(stderr)),
            strategy: None,
            delta: StateDelta::default(),
            last_error: stderr.trim().to_string(),
        }
    }

    pub fn triggered_support_mode(&self) -> bool {
        !self.delta.is_empty()
    }
}
