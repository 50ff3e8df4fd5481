// ABOUTME: Scan modes derived from the resume/retry flags and the work each mode selects.
// ABOUTME: Successes and permanent failures are never re-attempted by a retry run.

use snafu::ensure;
use std::collections::HashSet;
use std::path::Path;

use crate::classify;

use super::error::{ConflictingModesSnafu, MissingCheckpointSnafu, SkipWithoutRetrySnafu};
use super::{Checkpoint, CheckpointError, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Scan everything, replacing any previous checkpoint.
    Fresh,
    /// Scan only images without a recorded outcome.
    Resume,
    /// Re-attempt recoverable failures from an existing checkpoint.
    RetryFailures { skip_permanent: bool },
}

impl ScanMode {
    pub fn from_flags(
        resume: bool,
        retry_failures: bool,
        skip_permanent: bool,
        checkpoint_path: &Path,
    ) -> Result<Self, CheckpointError> {
        ensure!(!(retry_failures && resume), ConflictingModesSnafu);
        ensure!(!skip_permanent || retry_failures, SkipWithoutRetrySnafu);
        if retry_failures {
            ensure!(
                checkpoint_path.exists(),
                MissingCheckpointSnafu {
                    path: checkpoint_path
                }
            );
            return Ok(ScanMode::RetryFailures { skip_permanent });
        }
        Ok(if resume { ScanMode::Resume } else { ScanMode::Fresh })
    }

    /// Whether an existing checkpoint is read before scanning.
    pub fn reads_checkpoint(&self) -> bool {
        !matches!(self, ScanMode::Fresh)
    }
}

/// Images to process for `mode`, in input order for fresh and resumed
/// runs and in checkpoint order for retries.
pub fn select_work(all_images: &[String], checkpoint: Option<&Checkpoint>, mode: ScanMode) -> Vec<String> {
    match (mode, checkpoint) {
        (ScanMode::Fresh, _) | (ScanMode::Resume, None) => all_images.to_vec(),
        (ScanMode::Resume, Some(checkpoint)) => {
            let done: HashSet<&str> = checkpoint.records.iter().map(|r| r.reference.as_str()).collect();
            all_images
                .iter()
                .filter(|image| !done.contains(image.as_str()))
                .cloned()
                .collect()
        }
        (ScanMode::RetryFailures { .. }, None) => Vec::new(),
        (ScanMode::RetryFailures { skip_permanent }, Some(checkpoint)) => checkpoint
            .records
            .iter()
            .filter(|r| r.outcome == Outcome::RecoverableFailure)
            .filter(|r| {
                let permanent = r.error.as_deref().is_some_and(classify::is_permanent);
                if skip_permanent && permanent {
                    tracing::debug!("Skipping {}: failure looks permanent", r.reference);
                    return false;
                }
                true
            })
            .map(|r| r.reference.clone())
            .collect(),
    }
}
