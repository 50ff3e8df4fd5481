// ABOUTME: Diagnostics accumulator for non-fatal warnings during a batch scan.
// ABOUTME: Collects problems that must not abort the batch but should be reported at the end.

/// Collects non-fatal warnings during batch operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Take over warnings collected elsewhere. They were already logged.
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// A non-fatal warning collected during a batch.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn token_refresh(host: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::TokenRefresh,
            message: format!("credential refresh for {host} failed: {reason}"),
        }
    }

    pub fn checkpoint_flush(reason: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::CheckpointFlush,
            message: format!("checkpoint flush failed: {reason}"),
        }
    }

    pub fn tool_missing(tool: &str) -> Self {
        Self {
            kind: WarningKind::ToolMissing,
            message: format!("{tool} is not installed or not in PATH"),
        }
    }

    pub fn invalid_image(input: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::InvalidImage,
            message: format!("skipping {input}: {reason}"),
        }
    }
}

/// Categories of warnings that can occur during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A credential refresh failed; pulls continue with the stale credential.
    TokenRefresh,
    /// An intermediate checkpoint write failed; the previous file is intact.
    CheckpointFlush,
    /// An optional external tool is not installed.
    ToolMissing,
    /// An input line could not be parsed as an image reference.
    InvalidImage,
}
