// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Integration payload
//!
//! An [`Integration`] aggregates [`Entity`] records, each carrying metric
//! sets, and writes them out as one protocol-versioned JSON payload.
//!
//! # Example
//!
//! ```rust
//! use integra::{IntegrationBuilder, SourceType};
//!
//! let mut integration = IntegrationBuilder::new("redis", "1.0.0")
//!     .in_memory_store()
//!     .writer(std::io::sink())
//!     .build()
//!     .unwrap();
//!
//! let entity = integration.entity("redis-01:6379", "instance").unwrap();
//! let ms = entity.new_metric_set("RedisSample").unwrap();
//! ms.set_metric("net.connectionsPerSecond", 42, SourceType::Rate).unwrap();
//!
//! integration.publish().unwrap();
//! ```

mod builder;

pub use builder::IntegrationBuilder;

use crate::error::{IntegrationError, MetricError};
use crate::metric::MetricSet;
use crate::persist::{self, SharedStorer};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Locking strategy, fixed when the integration is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locker {
    /// Exclusive `&mut` access only; no runtime lock
    #[default]
    Disabled,
    /// Guarded by a mutex; the integration may be shared between threads
    Mutex,
}

/// Identity of a remote entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub namespace: String,
}

/// Metric sets reported for one entity
#[derive(Serialize)]
pub struct Entity {
    /// `None` for the local entity
    #[serde(rename = "entity", skip_serializing_if = "Option::is_none")]
    metadata: Option<EntityMetadata>,
    metrics: Vec<MetricSet>,
    #[serde(skip)]
    storer: Option<SharedStorer>,
}

impl Entity {
    fn new(metadata: Option<EntityMetadata>, storer: Option<SharedStorer>) -> Self {
        Self {
            metadata,
            metrics: Vec::new(),
            storer,
        }
    }

    /// Entity identity, `None` for the local entity
    pub fn metadata(&self) -> Option<&EntityMetadata> {
        self.metadata.as_ref()
    }

    /// Whether this is the local entity
    pub fn is_local(&self) -> bool {
        self.metadata.is_none()
    }

    /// Add a metric set bound to the integration's store
    pub fn new_metric_set(&mut self, event_type: &str) -> Result<&mut MetricSet, MetricError> {
        let ms = MetricSet::new(event_type, self.storer.clone())?;
        self.metrics.push(ms);
        let last = self.metrics.len() - 1;
        Ok(&mut self.metrics[last])
    }

    /// Metric sets added so far
    pub fn metric_sets(&self) -> &[MetricSet] {
        &self.metrics
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("metadata", &self.metadata)
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Protocol-versioned payload of one integration run
#[derive(Serialize)]
pub struct Integration {
    name: String,
    protocol_version: &'static str,
    integration_version: String,
    #[serde(rename = "data")]
    entities: Vec<Entity>,
    #[serde(skip)]
    storer: Option<SharedStorer>,
    #[serde(skip)]
    writer: Box<dyn Write + Send>,
    #[serde(skip)]
    pretty: bool,
    #[serde(skip)]
    publish_metrics: bool,
    #[serde(skip)]
    locker: Locker,
}

impl Integration {
    /// Integration name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Integration version
    pub fn version(&self) -> &str {
        &self.integration_version
    }

    /// Bound store, if any
    pub fn storer(&self) -> Option<&SharedStorer> {
        self.storer.as_ref()
    }

    /// Locking strategy chosen at build time
    pub fn locker(&self) -> Locker {
        self.locker
    }

    /// Entities added so far
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entity `name` of type `namespace`, created on first use
    pub fn entity(
        &mut self,
        name: &str,
        namespace: &str,
    ) -> Result<&mut Entity, IntegrationError> {
        if name.is_empty() || namespace.is_empty() {
            return Err(IntegrationError::EntityMetadataRequired);
        }
        let metadata = EntityMetadata {
            name: name.to_string(),
            namespace: namespace.to_string(),
        };
        Ok(self.find_or_add(Some(metadata)))
    }

    /// Entity for the host the integration runs on, created on first use
    pub fn local_entity(&mut self) -> &mut Entity {
        self.find_or_add(None)
    }

    fn find_or_add(&mut self, metadata: Option<EntityMetadata>) -> &mut Entity {
        if let Some(i) = self.entities.iter().position(|e| e.metadata == metadata) {
            return &mut self.entities[i];
        }
        let entity = Entity::new(metadata, self.storer.clone());
        self.entities.push(entity);
        let last = self.entities.len() - 1;
        &mut self.entities[last]
    }

    /// Payload as JSON
    pub fn to_json(&self, pretty: bool) -> Result<Vec<u8>, IntegrationError> {
        let bytes = if pretty {
            serde_json::to_vec_pretty(self)?
        } else {
            serde_json::to_vec(self)?
        };
        Ok(bytes)
    }

    /// Save the store, write the payload and clear the entities
    ///
    /// The store is saved first; a failed save aborts the publish so stale
    /// baselines are never silently kept. When the arguments deselect metrics,
    /// entities are written without their metric sets.
    pub fn publish(&mut self) -> Result<(), IntegrationError> {
        if let Some(storer) = &self.storer {
            persist::lock(storer).save()?;
        }

        if !self.publish_metrics {
            for entity in &mut self.entities {
                entity.metrics.clear();
            }
        }

        let mut output = self.to_json(self.pretty)?;
        output.push(b'\n');
        self.writer
            .write_all(&output)
            .and_then(|_| self.writer.flush())
            .map_err(|e| IntegrationError::Write(e.to_string()))?;

        debug!(
            integration = %self.name,
            entities = self.entities.len(),
            bytes = output.len(),
            "payload published"
        );
        self.clear();
        Ok(())
    }

    /// Drop all entities
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Hand out a handle usable from several threads
    ///
    /// Only available when built with [`IntegrationBuilder::synchronized`].
    pub fn into_shared(self) -> Result<SharedIntegration, IntegrationError> {
        match self.locker {
            Locker::Mutex => Ok(SharedIntegration {
                inner: Arc::new(Mutex::new(self)),
            }),
            Locker::Disabled => Err(IntegrationError::InvalidConfig(
                "integration was not built synchronized".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integration")
            .field("name", &self.name)
            .field("protocol_version", &self.protocol_version)
            .field("integration_version", &self.integration_version)
            .field("entities", &self.entities)
            .field("pretty", &self.pretty)
            .field("publish_metrics", &self.publish_metrics)
            .field("locker", &self.locker)
            .finish_non_exhaustive()
    }
}

/// Mutex-guarded integration handle, cloneable across threads
#[derive(Clone)]
pub struct SharedIntegration {
    inner: Arc<Mutex<Integration>>,
}

impl SharedIntegration {
    /// Run `f` with exclusive access to the integration
    pub fn with<R>(&self, f: impl FnOnce(&mut Integration) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Publish under the lock
    pub fn publish(&self) -> Result<(), IntegrationError> {
        self.with(Integration::publish)
    }
}

impl fmt::Debug for SharedIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIntegration").finish_non_exhaustive()
    }
}
