//! Storage layout for tempo.
//!
//! All persistent state lives under a single data directory next to the
//! work being tracked:
//!
//! ```text
//! .tempo/                       # Data directory
//!   events.jsonl                # Append-only event log
//!   events.jsonl.lock           # fs2 lock for log writes
//!   snapshot.json               # Materialized AppState
//!   snapshot.json.lock          # fs2 lock for snapshot writes
//! .tempo.toml                   # Configuration (sibling of .tempo/)
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock;

/// Name of the data directory
pub const DATA_DIR: &str = ".tempo";

/// Name of the event log file inside the data directory
pub const EVENTS_FILE: &str = "events.jsonl";

/// Name of the snapshot file inside the data directory
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Name of the config file, sibling of the data directory
pub const CONFIG_FILE: &str = ".tempo.toml";

/// Resolves paths inside a tempo root directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` looking for an initialized data directory.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        for dir in start.ancestors() {
            if dir.join(DATA_DIR).is_dir() {
                return Ok(Self::new(dir));
            }
        }
        Err(Error::NotInitialized(start.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn events_file(&self) -> PathBuf {
        self.data_dir().join(EVENTS_FILE)
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir().join(SNAPSHOT_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Create the data directory and touch the event log.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        let events = self.events_file();
        if !events.exists() {
            File::create(&events)?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir().is_dir()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON atomically (temp + rename) so readers never see a partial
    /// document.
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read a JSON document.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paths_hang_off_the_root() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());

        assert_eq!(storage.data_dir(), temp.path().join(".tempo"));
        assert_eq!(
            storage.events_file(),
            temp.path().join(".tempo/events.jsonl")
        );
        assert_eq!(
            storage.snapshot_file(),
            temp.path().join(".tempo/snapshot.json")
        );
        assert_eq!(storage.config_file(), temp.path().join(".tempo.toml"));
    }

    #[test]
    fn init_creates_dir_and_log() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert!(!storage.is_initialized());

        storage.init().unwrap();
        assert!(storage.is_initialized());
        assert!(storage.events_file().exists());
    }

    #[test]
    fn discover_walks_up() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.init().unwrap();

        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        let found = Storage::discover(&nested).unwrap();
        assert_eq!(found.root(), temp.path());
    }

    #[test]
    fn discover_fails_outside_any_root() {
        let temp = TempDir::new().unwrap();
        let err = Storage::discover(temp.path()).unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[test]
    fn json_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.init().unwrap();

        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Doc {
            name: String,
            value: i32,
        }

        let path = storage.data_dir().join("doc.json");
        let doc = Doc {
            name: "test".to_string(),
            value: 42,
        };
        storage.write_json(&path, &doc).unwrap();
        let back: Doc = storage.read_json(&path).unwrap();
        assert_eq!(doc, back);
    }
}
