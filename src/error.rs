// ABOUTME: Application-wide error types for pullwarden.
// ABOUTME: Aggregates module errors for the binary; library layers keep their own enums.

use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::remote::RemoteError;
use crate::types::ParseImageRefError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid image reference: {0}")]
    ImageRef(#[from] ParseImageRefError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_errors_surface_their_own_message() {
        let err: Error = CheckpointError::ConflictingModes.into();
        assert_eq!(
            err.to_string(),
            "--retry-failures and --resume are mutually exclusive"
        );
        assert!(matches!(err, Error::Checkpoint(_)));
    }
}
