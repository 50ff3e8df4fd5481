// ABOUTME: Durable per-image scan outcomes for resuming and retrying long batches.
// ABOUTME: Saved as versioned JSON, written to a temp file and renamed into place.

mod error;
mod mode;

pub use error::{CheckpointError, CheckpointErrorKind};
pub use mode::{ScanMode, select_work};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::classify::{self, FailureKind};
use crate::pull::PullResult;
use error::{CorruptSnafu, PersistSnafu, ReadSnafu, RemoveSnafu, SerializeSnafu, WriteSnafu};

pub const CHECKPOINT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Auth, malformed reference and other failures a retry will not fix.
    PermanentFailure,
    /// Every fallback was exhausted on a failure that may clear up later.
    RecoverableFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub reference: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    /// The image actually pulled when a fallback was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_used: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn success(reference: impl Into<String>, image_used: Option<String>) -> Self {
        Self {
            reference: reference.into(),
            outcome: Outcome::Success,
            error: None,
            error_kind: None,
            image_used,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(reference: impl Into<String>, stderr: &str) -> Self {
        let outcome = if classify::is_recoverable(stderr) {
            Outcome::RecoverableFailure
        } else {
            Outcome::PermanentFailure
        };
        Self {
            reference: reference.into(),
            outcome,
            error: Some(stderr.trim().to_string()),
            error_kind: Some(classify::classify(stderr)),
            image_used: None,
            timestamp: Utc::now(),
        }
    }

    /// An input that never became a pull, such as an unparseable reference.
    pub fn invalid(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            reference: reference.into(),
            outcome: Outcome::PermanentFailure,
            error: Some(reason.to_string()),
            error_kind: None,
            image_used: None,
            timestamp: Utc::now(),
        }
    }

    pub fn from_pull(reference: impl Into<String>, result: &PullResult) -> Self {
        if result.success {
            let used = result.is_fallback.then(|| result.image.full_name());
            Self::success(reference, used)
        } else {
            Self::failure(reference, &result.last_error)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub success: usize,
    pub permanent_failure: usize,
    pub recoverable_failure: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, alias = "results")]
    pub records: Vec<CheckpointRecord>,
    /// Reference to position in `records`, valid while `indexed_len` matches.
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    indexed_len: usize,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint {
    /// Empty checkpoint stamped with this host and process.
    pub fn new() -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "holder".to_string(),
            gethostname::gethostname().to_string_lossy().into_owned().into(),
        );
        metadata.insert("pid".to_string(), std::process::id().into());
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            timestamp: Utc::now(),
            metadata,
            records: Vec::new(),
            index: HashMap::new(),
            indexed_len: 0,
        }
    }

    /// Replace records for references already present, append the rest.
    pub fn merge(&mut self, records: impl IntoIterator<Item = CheckpointRecord>) {
        self.reindex();
        for record in records {
            match self.index.get(&record.reference) {
                Some(&pos) => self.records[pos] = record,
                None => {
                    self.index.insert(record.reference.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }
        self.indexed_len = self.records.len();
    }

    pub fn record(&self, reference: &str) -> Option<&CheckpointRecord> {
        if self.indexed_len == self.records.len() {
            return self.index.get(reference).map(|&pos| &self.records[pos]);
        }
        self.records.iter().rev().find(|r| r.reference == reference)
    }

    /// Rebuild the index after deserialization or direct edits to `records`.
    fn reindex(&mut self) {
        if self.indexed_len == self.records.len() {
            return;
        }
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.reference.clone(), pos))
            .collect();
        self.indexed_len = self.records.len();
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for record in &self.records {
            match record.outcome {
                Outcome::Success => summary.success += 1,
                Outcome::PermanentFailure => summary.permanent_failure += 1,
                Outcome::RecoverableFailure => summary.recoverable_failure += 1,
            }
        }
        summary
    }
}

/// File-backed checkpoint persistence.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let content = std::fs::read_to_string(&self.path).context(ReadSnafu { path: &self.path })?;
        let checkpoint: Checkpoint = serde_json::from_str(&content).context(CorruptSnafu { path: &self.path })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            tracing::warn!(
                "Checkpoint version mismatch: file has {}, expected {}",
                checkpoint.version,
                CHECKPOINT_VERSION
            );
        }
        tracing::debug!(
            "Loaded {} records from {}",
            checkpoint.records.len(),
            self.path.display()
        );
        Ok(checkpoint)
    }

    /// Atomically replace the file with `checkpoint`, refreshing its timestamp.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut stamped = checkpoint.clone();
        stamped.timestamp = Utc::now();
        let json = serde_json::to_vec_pretty(&stamped).context(SerializeSnafu)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).context(WriteSnafu { path: &self.path })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).context(WriteSnafu { path: &self.path })?;
        tmp.write_all(&json).context(WriteSnafu { path: &self.path })?;
        tmp.as_file().sync_all().context(WriteSnafu { path: &self.path })?;
        tmp.persist(&self.path).context(PersistSnafu { path: &self.path })?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(RemoveSnafu { path: &self.path }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_outcome_follows_classification() {
        assert_eq!(
            CheckpointRecord::failure("a", "timeout").outcome,
            Outcome::RecoverableFailure
        );
        assert_eq!(
            CheckpointRecord::failure("a", "denied: requested access").outcome,
            Outcome::PermanentFailure
        );
        assert_eq!(
            CheckpointRecord::failure("a", "disk full").outcome,
            Outcome::PermanentFailure
        );
    }

    #[test]
    fn merge_replaces_by_reference() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.merge([
            CheckpointRecord::failure("a", "timeout"),
            CheckpointRecord::success("b", None),
        ]);
        checkpoint.merge([CheckpointRecord::success("a", Some("mirror.gcr.io/library/a".into()))]);
        assert_eq!(checkpoint.records.len(), 2);
        assert_eq!(checkpoint.records[0].reference, "a");
        assert_eq!(checkpoint.record("a").unwrap().outcome, Outcome::Success);
        assert_eq!(checkpoint.summary().success, 2);
    }

    #[test]
    fn merge_after_load_uses_existing_records() {
        let json = r#"{"version":"1.0","timestamp":"2024-01-01T00:00:00Z",
            "records":[{"reference":"a","outcome":"recoverable_failure","timestamp":"2024-01-01T00:00:00Z"}]}"#;
        let mut checkpoint: Checkpoint = serde_json::from_str(json).unwrap();
        checkpoint.merge([CheckpointRecord::success("a", None)]);
        assert_eq!(checkpoint.records.len(), 1);
        assert_eq!(checkpoint.record("a").unwrap().outcome, Outcome::Success);
    }

    #[test]
    fn merging_many_references_keeps_one_record_each() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.merge((0..5000).map(|i| CheckpointRecord::failure(format!("img:{i}"), "timeout")));
        checkpoint.merge((0..5000).map(|i| CheckpointRecord::success(format!("img:{i}"), None)));
        assert_eq!(checkpoint.records.len(), 5000);
        assert_eq!(checkpoint.summary().success, 5000);
        assert_eq!(checkpoint.record("img:4999").unwrap().outcome, Outcome::Success);
    }

    #[test]
    fn metadata_names_holder_and_pid() {
        let checkpoint = Checkpoint::new();
        assert!(checkpoint.metadata.contains_key("holder"));
        assert_eq!(
            checkpoint.metadata["pid"],
            serde_json::Value::from(std::process::id())
        );
    }

    #[test]
    fn save_then_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested/checkpoint.json"));
        assert!(!store.exists());

        let mut checkpoint = Checkpoint::new();
        checkpoint.merge([CheckpointRecord::failure("nginx:1", "manifest unknown")]);
        store.save(&checkpoint).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert_eq!(loaded.records, checkpoint.records);

        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }
}
