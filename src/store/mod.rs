//! Persisted collection I/O: final output, periodic checkpoints and the
//! partial flush written when a crawl is cancelled.
//!
//! All writes go through a sibling temporary file that is renamed into place,
//! so the target path only ever holds a complete JSON document.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{FriendgraphError, Result};
use crate::model::UserRecord;

const CHECKPOINT_PREFIX: &str = "checkpoint_";

/// Write the collection to `path` atomically.
pub fn save_collection(path: &Path, records: &[UserRecord]) -> Result<()> {
    write_json_atomic(path, records)?;
    log::debug!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

/// Pretty-print `value` to a sibling temp file, then rename it over `path`.
/// Missing parent directories are created.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load a persisted collection. Unreadable or undecodable files are errors,
/// as is a collection that lists the same identifier twice.
pub fn load_collection(path: &Path) -> Result<Vec<UserRecord>> {
    let body = fs::read(path)?;
    let records: Vec<UserRecord> = serde_json::from_slice(&body)?;

    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.identifier.as_str()) {
            return Err(FriendgraphError::InvalidInput(format!(
                "duplicate identifier {} in {}",
                record.identifier,
                path.display()
            )));
        }
    }

    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Checkpoint file discovered on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    /// Processed count at the time the checkpoint was written.
    pub processed: usize,
}

/// Checkpoint file name for a given processed count.
/// Format: `checkpoint_<processed:06>_<YYYYmmddTHHMMSSZ>.json`.
pub fn checkpoint_file_name(processed: usize) -> String {
    format!(
        "{}{:06}_{}.json",
        CHECKPOINT_PREFIX,
        processed,
        Utc::now().format("%Y%m%dT%H%M%SZ")
    )
}

/// Recover the processed count from a checkpoint file name.
pub fn parse_checkpoint_name(file_name: &str) -> Option<usize> {
    let rest = file_name
        .strip_prefix(CHECKPOINT_PREFIX)?
        .strip_suffix(".json")?;
    let (count, _timestamp) = rest.split_once('_')?;
    count.parse().ok()
}

/// Where a crawl writes its output.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    output_path: PathBuf,
    checkpoint_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(output_path: P, checkpoint_dir: Q) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            checkpoint_dir: checkpoint_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// `<stem>_partial.json` beside the final output.
    pub fn partial_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("collection");
        self.output_path
            .with_file_name(format!("{}_partial.json", stem))
    }

    pub fn write_final(&self, records: &[UserRecord]) -> Result<PathBuf> {
        save_collection(&self.output_path, records)?;
        Ok(self.output_path.clone())
    }

    pub fn write_partial(&self, records: &[UserRecord]) -> Result<PathBuf> {
        let path = self.partial_path();
        save_collection(&path, records)?;
        Ok(path)
    }

    pub fn write_checkpoint(&self, records: &[UserRecord], processed: usize) -> Result<PathBuf> {
        let path = self.checkpoint_dir.join(checkpoint_file_name(processed));
        save_collection(&path, records)?;
        Ok(path)
    }

    /// Checkpoints in `checkpoint_dir`, ordered by processed count.
    /// A missing directory yields an empty list.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        if !self.checkpoint_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in WalkDir::new(&self.checkpoint_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some(processed) = parse_checkpoint_name(name) {
                checkpoints.push(CheckpointInfo {
                    path: entry.path().to_path_buf(),
                    processed,
                });
            }
        }

        checkpoints.sort_by(|a, b| a.processed.cmp(&b.processed).then_with(|| a.path.cmp(&b.path)));
        Ok(checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{item, user};
    use tempfile::TempDir;

    fn sample() -> Vec<UserRecord> {
        vec![
            user("a", Some("BR"), vec![item("1", 10)], &["b"]),
            user("b", None, vec![], &["a"]),
        ]
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/users.json");
        save_collection(&path, &sample()).unwrap();

        let loaded = load_collection(&path).unwrap();
        assert_eq!(loaded, sample());
        assert!(!temp_dir.path().join("nested/users.json.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_collection(&temp_dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, FriendgraphError::Io(_)));
    }

    #[test]
    fn test_load_malformed_file_is_json_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("users.json");
        fs::write(&path, "[{\"identifier\": 1").unwrap();
        let err = load_collection(&path).unwrap_err();
        assert!(matches!(err, FriendgraphError::Json(_)));
    }

    #[test]
    fn test_load_rejects_duplicate_identifiers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("users.json");
        let records = vec![user("a", None, vec![], &[]), user("a", None, vec![], &[])];
        save_collection(&path, &records).unwrap();
        let err = load_collection(&path).unwrap_err();
        assert!(matches!(err, FriendgraphError::InvalidInput(_)));
    }

    #[test]
    fn test_checkpoint_name_round_trip() {
        let name = checkpoint_file_name(150);
        assert!(name.starts_with("checkpoint_000150_"));
        assert_eq!(parse_checkpoint_name(&name), Some(150));
        assert_eq!(parse_checkpoint_name("users.json"), None);
        assert_eq!(parse_checkpoint_name("checkpoint_abc_x.json"), None);
    }

    #[test]
    fn test_partial_path_sits_beside_output() {
        let store = SnapshotStore::new("data/users.json", "data/checkpoints");
        assert_eq!(store.partial_path(), PathBuf::from("data/users_partial.json"));
    }

    #[test]
    fn test_list_checkpoints_sorted_by_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(
            temp_dir.path().join("users.json"),
            temp_dir.path().join("checkpoints"),
        );
        assert!(store.list_checkpoints().unwrap().is_empty());

        store.write_checkpoint(&sample(), 100).unwrap();
        store.write_checkpoint(&sample(), 50).unwrap();
        fs::write(temp_dir.path().join("checkpoints/notes.txt"), "x").unwrap();

        let checkpoints = store.list_checkpoints().unwrap();
        let counts: Vec<_> = checkpoints.iter().map(|c| c.processed).collect();
        assert_eq!(counts, vec![50, 100]);
        assert_eq!(load_collection(&checkpoints[0].path).unwrap().len(), 2);
    }
}
