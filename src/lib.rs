// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Integra - Stateful metrics core for integration agents
//!
//! Monitoring integrations usually run as a fresh process on every polling
//! interval. Integra turns their raw samples into a protocol-versioned JSON
//! payload and keeps the previous sample of every counter in a store, so
//! rates and deltas stay correct across runs.
//!
//! ## Key Features
//!
//! - **Source types**: gauges, rates, deltas and string attributes
//! - **Durable baselines**: file store with expiry of stale state
//! - **Injectable clock**: deterministic rate math under test
//! - **Stable output**: lexicographically ordered JSON
//!
//! ## Quick Start
//!
//! ```rust
//! use integra::persist::{shared, InMemoryStore};
//! use integra::{MetricSet, SourceType};
//!
//! let storer = shared(InMemoryStore::new());
//! let mut ms = MetricSet::new("NetworkSample", Some(storer)).unwrap();
//!
//! ms.set_metric("interface", "eth0", SourceType::Attribute).unwrap();
//! ms.set_metric("bytesSent", 1024, SourceType::Rate).unwrap();
//! ms.set_metric("mtu", 1500, SourceType::Gauge).unwrap();
//!
//! // First sample of a rate has no baseline yet
//! assert_eq!(
//!     ms.to_json().unwrap(),
//!     r#"{"bytesSent":0,"event_type":"NetworkSample","interface":"eth0","mtu":1500}"#
//! );
//! ```
//!
//! ## Modules
//!
//! - [`metric`]: Source types, metric sets and their serialization
//! - [`persist`]: Baseline stores (in-memory and file-backed)
//! - [`clock`]: Time sources
//! - [`integration`]: Payload aggregate, entities and builder
//! - [`args`]: Default integration arguments

// Modules
pub mod args;
pub mod clock;
pub mod error;
pub mod integration;
pub mod metric;
pub mod persist;

// Re-exports for convenient access
pub use args::DefaultArgs;
pub use clock::{Clock, SteppingClock, SystemClock};
pub use error::{IntegraError, IntegrationError, MetricError, Result, StoreError};
pub use integration::{
    Entity, EntityMetadata, Integration, IntegrationBuilder, Locker, SharedIntegration,
};
pub use metric::{MetricSet, MetricValue, SourceType};
pub use persist::{Entry, FileStore, InMemoryStore, SharedStorer, Storer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Payload protocol version
pub const PROTOCOL_VERSION: &str = "2";
