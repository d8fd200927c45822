//! Snapshot persistence for tempo.
//!
//! The snapshot is a single JSON document materializing `AppState` so a
//! restart does not replay the whole log. It records how many log events
//! it reflects (`applied`); on open the store compares that against the
//! log and folds only the tail, or falls back to a full replay when the
//! snapshot is missing, unreadable, or ahead of the log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::state::AppState;

/// Schema version stamped on snapshot documents.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "tempo.snapshot.v1";

/// The persisted snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    /// Number of log events folded into this state.
    pub applied: usize,
    #[serde(flatten)]
    pub state: AppState,
}

/// Reads and writes the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot if present and decodable. A snapshot with an
    /// unexpected schema version is treated as absent; the log is the
    /// source of truth, so the caller just replays.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let lock_path = self.lock_path();
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "unreadable snapshot, falling back to full replay"
                );
                return Ok(None);
            }
        };
        if snapshot.version != SNAPSHOT_SCHEMA_VERSION {
            tracing::warn!(
                version = %snapshot.version,
                "snapshot schema version mismatch, falling back to full replay"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Persist the state atomically under a file lock.
    pub fn save(&self, state: &AppState, applied: usize) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            last_updated: Utc::now(),
            applied,
            state: state.clone(),
        };
        let lock_path = self.lock_path();
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        crate::lock::write_atomic(&self.path, json.as_bytes())
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips_state() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("snapshot.json"));

        assert!(store.load().unwrap().is_none());

        let state = AppState::empty(2.5);
        store.save(&state, 7).unwrap();

        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(snapshot.applied, 7);
        assert_eq!(snapshot.state, state);
    }

    #[test]
    fn snapshot_document_has_expected_top_level_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");
        let store = SnapshotStore::new(&path);
        store.save(&AppState::empty(1.0), 0).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in [
            "projects",
            "milestones",
            "tasks",
            "relations",
            "statistics",
            "last_updated",
            "version",
        ] {
            assert!(raw.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn garbage_snapshot_is_treated_as_absent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");
        std::fs::write(&path, "{broken").unwrap();
        let store = SnapshotStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }
}
