// ABOUTME: Checkpoint error types with SNAFU context selectors.
// ABOUTME: Invalid scan-mode flag combinations fail here before any work starts.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    #[snafu(display("--retry-failures and --resume are mutually exclusive"))]
    ConflictingModes,

    #[snafu(display("--skip-permanent-failures requires --retry-failures"))]
    SkipWithoutRetry,

    #[snafu(display("--retry-failures requires existing checkpoint file: {}", path.display()))]
    MissingCheckpoint { path: PathBuf },

    #[snafu(display("failed to read checkpoint {}: {source}", path.display()))]
    Read { path: PathBuf, source: std::io::Error },

    #[snafu(display("checkpoint {} is unreadable: {source}", path.display()))]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to serialize checkpoint: {source}"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("failed to write checkpoint {}: {source}", path.display()))]
    Write { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to replace checkpoint {}: {source}", path.display()))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("failed to remove checkpoint {}: {source}", path.display()))]
    Remove { path: PathBuf, source: std::io::Error },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorKind {
    /// The requested flag combination is invalid.
    InvalidMode,
    /// A checkpoint was required but does not exist.
    Missing,
    /// The checkpoint exists but cannot be read or parsed.
    Unreadable,
    /// Writing or removing the checkpoint failed.
    WriteFailed,
}

impl CheckpointError {
    pub fn kind(&self) -> CheckpointErrorKind {
        match self {
            CheckpointError::ConflictingModes | CheckpointError::SkipWithoutRetry => {
                CheckpointErrorKind::InvalidMode
            }
            CheckpointError::MissingCheckpoint { .. } => CheckpointErrorKind::Missing,
            CheckpointError::Read { .. } | CheckpointError::Corrupt { .. } => {
                CheckpointErrorKind::Unreadable
            }
            CheckpointError::Serialize { .. }
            | CheckpointError::Write { .. }
            | CheckpointError::Persist { .. }
            | CheckpointError::Remove { .. } => CheckpointErrorKind::WriteFailed,
        }
    }
}
