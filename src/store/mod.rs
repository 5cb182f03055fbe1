//! The snapshot store: a directory of JSON documents under `data/`.
//!
//! Two write disciplines apply:
//! - the snapshot (`data.json`) and history are replaced wholesale with a
//!   temp-file-and-rename so readers never observe a partial document;
//! - CRUD resource files are mutated read-modify-write while holding an
//!   exclusive lock on a sidecar lock file, serializing concurrent writers.

pub mod resources;
pub mod settings;

use crate::data::{ChatHistory, DailyHistory, Snapshot};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE: &str = "data.json";
pub const HISTORY_FILE: &str = "history.json";
pub const CHAT_HISTORY_FILE: &str = "chat_history.json";

/// Handle to the data directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Read and parse a JSON document. Missing or unparsable files yield
    /// `None`; a corrupt file is logged, never fatal.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path(name);
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write a JSON document atomically: serialize to `<name>.tmp` in the
    /// same directory, then rename over the target.
    pub fn write_json_atomic<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));

        let content =
            serde_json::to_string_pretty(value).context("Failed to serialize document")?;

        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }

    /// Run `f` while holding an exclusive lock scoped to `name`.
    ///
    /// The lock lives on a sidecar `.lock` file so the data file itself can
    /// still be atomically renamed over while locked.
    pub fn with_resource_lock<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Store) -> Result<T>,
    ) -> Result<T> {
        let lock_path = self.path(&format!("{name}.lock"));
        let lock = File::create(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        lock.lock_exclusive()?;

        let result = f(self);

        if let Err(e) = lock.unlock() {
            tracing::warn!("Failed to release lock on {}: {}", lock_path.display(), e);
        }

        result
    }

    // -------------------------------------------------------------------------
    // Typed accessors
    // -------------------------------------------------------------------------

    /// The last successfully written snapshot, or the empty state.
    pub fn read_snapshot(&self) -> Snapshot {
        self.read_json(SNAPSHOT_FILE).unwrap_or_default()
    }

    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_json_atomic(SNAPSHOT_FILE, snapshot)
    }

    pub fn read_history(&self) -> DailyHistory {
        self.read_json(HISTORY_FILE).unwrap_or_default()
    }

    pub fn write_history(&self, history: &DailyHistory) -> Result<()> {
        self.write_json_atomic(HISTORY_FILE, history)
    }

    pub fn read_chat_history(&self) -> ChatHistory {
        self.read_json(CHAT_HISTORY_FILE).unwrap_or_default()
    }

    pub fn write_chat_history(&self, history: &ChatHistory) -> Result<()> {
        self.with_resource_lock(CHAT_HISTORY_FILE, |s| {
            s.write_json_atomic(CHAT_HISTORY_FILE, history)
        })
    }
}
