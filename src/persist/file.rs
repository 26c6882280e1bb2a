// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Durable file-backed store
//!
//! # File Format
//!
//! One JSON document, rewritten whole on every save:
//!
//! ```text
//! {
//!   "timestamp": "2025-01-01T00:00:00Z",        save time
//!   "entries": {
//!     "<key>": { "value": 1.0, "timestamp": "2025-01-01T00:00:00Z" }
//!   }
//! }
//! ```
//!
//! A missing, unreadable or unparseable file loads as an empty store. A file
//! saved more than [`DEFAULT_TTL`] ago also loads as empty, so a baseline from
//! an agent that was stopped for a long time can't skew the next rate.

use super::{Entry, InMemoryStore, Storer};
use crate::clock::{system_clock, Clock};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Age after which a saved store is ignored on load
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Directory under the system temp dir holding default store files
const STORE_DIR: &str = "integra";

/// Default store file for an integration
pub fn default_path(integration_name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(STORE_DIR)
        .join(format!("{}.json", integration_name))
}

#[derive(Serialize, Deserialize)]
struct StoreFile<'a> {
    timestamp: DateTime<Utc>,
    entries: Cow<'a, BTreeMap<String, Entry>>,
}

/// Store persisted to a single JSON file
pub struct FileStore {
    path: PathBuf,
    store: InMemoryStore,
}

impl FileStore {
    /// Open the store at `path` on the wall clock
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, system_clock())
    }

    /// Open the store at `path`, using `clock` for entry timestamps and expiry
    ///
    /// Only failing to create the parent directory is an error; any problem
    /// with the file itself yields an empty store. The clock is read once,
    /// whether or not the file exists.
    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let dir = parent_dir(&path);
        fs::create_dir_all(dir).map_err(|e| StoreError::create_dir(dir, e))?;

        let opened_at = clock.now();
        let entries = match read_store_file(&path) {
            Ok(Some(file)) => {
                let age = opened_at - file.timestamp;
                // A save time in the future counts as fresh
                let expired = age.to_std().map_or(false, |age| age > DEFAULT_TTL);
                if expired {
                    debug!(
                        path = %path.display(),
                        age_secs = age.num_seconds(),
                        "store file expired, starting empty"
                    );
                    BTreeMap::new()
                } else {
                    debug!(
                        path = %path.display(),
                        keys = file.entries.len(),
                        "store file loaded"
                    );
                    file.entries.into_owned()
                }
            }
            Ok(None) => {
                debug!(path = %path.display(), "no store file, starting empty");
                BTreeMap::new()
            }
            Err(err) => {
                warn!(error = %err, "ignoring store file");
                BTreeMap::new()
            }
        };

        Ok(Self {
            path,
            store: InMemoryStore::from_entries(entries, clock),
        })
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored keys, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.store.keys()
    }

    fn write(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            timestamp: self.store.clock().now(),
            entries: Cow::Borrowed(self.store.entries()),
        };
        let bytes =
            serde_json::to_vec(&file).map_err(|e| StoreError::save_failed(&self.path, e))?;

        // Write beside the target and rename, so readers never see a partial file
        let mut tmp = NamedTempFile::new_in(parent_dir(&self.path))
            .map_err(|e| StoreError::save_failed(&self.path, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::save_failed(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::save_failed(&self.path, e.error))?;
        Ok(())
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("store", &self.store)
            .finish()
    }
}

impl Storer for FileStore {
    fn get(&self, key: &str) -> Option<Entry> {
        self.store.get(key)
    }

    fn set(&mut self, key: &str, value: f64) -> DateTime<Utc> {
        self.store.set(key, value)
    }

    fn delete(&mut self, key: &str) -> Option<Entry> {
        self.store.delete(key)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        self.write()?;
        debug!(
            path = %self.path.display(),
            keys = self.store.len(),
            "store file saved"
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// `Ok(None)` when the file doesn't exist
fn read_store_file(path: &Path) -> Result<Option<StoreFile<'static>>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::load_corrupt(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::load_corrupt(path, e))
}
