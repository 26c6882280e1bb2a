// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Persistent key/value storage for metric baselines
//!
//! A [`Storer`] keeps at most one [`Entry`] per key: the last raw value seen
//! and the instant it was recorded. Two implementations are provided:
//!
//! - [`InMemoryStore`]: process-local, discarded on exit
//! - [`FileStore`]: loaded from and saved to a single JSON file, with state
//!   older than [`DEFAULT_TTL`] discarded on load
//!
//! Stores hold no internal synchronization. Sharing between an integration
//! and its metric sets goes through [`SharedStorer`].

mod file;
mod memory;

pub use file::{default_path, FileStore, DEFAULT_TTL};
pub use memory::InMemoryStore;

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stored baseline for one key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Last raw value
    pub value: f64,
    /// When `value` was recorded
    pub timestamp: DateTime<Utc>,
}

/// Key/value storage that remembers when each key was last written
pub trait Storer {
    /// Entry stored under `key`, if any
    fn get(&self, key: &str) -> Option<Entry>;

    /// Record `value` under `key` with the store's current time, replacing
    /// any previous entry. Returns the recorded timestamp.
    fn set(&mut self, key: &str, value: f64) -> DateTime<Utc>;

    /// Remove `key`, returning its entry
    fn delete(&mut self, key: &str) -> Option<Entry>;

    /// Persist the full mapping
    fn save(&mut self) -> Result<(), StoreError>;

    /// Number of stored keys
    fn len(&self) -> usize;

    /// Whether the store holds no keys
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store handle shared by an integration, its entities and metric sets
pub type SharedStorer = Arc<Mutex<dyn Storer + Send>>;

/// Wrap a store for sharing
pub fn shared<S: Storer + Send + 'static>(store: S) -> SharedStorer {
    Arc::new(Mutex::new(store))
}

/// Lock a shared store, recovering from a poisoned lock
///
/// Entries are written whole, so a panic elsewhere can't leave one half
/// updated.
pub fn lock(storer: &SharedStorer) -> MutexGuard<'_, dyn Storer + Send + 'static> {
    storer.lock().unwrap_or_else(PoisonError::into_inner)
}
