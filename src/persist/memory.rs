// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Ephemeral in-memory store

use super::{Entry, Storer};
use crate::clock::{system_clock, Clock};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Process-local store; nothing survives the process
pub struct InMemoryStore {
    entries: BTreeMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Empty store on the wall clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Empty store on the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_entries(BTreeMap::new(), clock)
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, Entry>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Stored keys, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Storer for InMemoryStore {
    fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, value: f64) -> DateTime<Utc> {
        let timestamp = self.clock.now();
        self.entries
            .insert(key.to_string(), Entry { value, timestamp });
        timestamp
    }

    fn delete(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
