// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Integra
//!
//! This module defines all error types used throughout the library.

use std::path::Path;
use thiserror::Error;

/// Result type alias for Integra operations
pub type Result<T> = std::result::Result<T, IntegraError>;

/// Main error type for Integra operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegraError {
    /// Metric validation error
    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Integration assembly or publishing error
    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
}

/// Errors raised by `MetricSet` operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Source type code outside the known set
    #[error("unknown source type {code} for key {name}")]
    UnknownSourceType { name: String, code: u32 },

    /// Value shape does not match the declared source type
    #[error("{reason} {name}")]
    InvalidValueType { name: String, reason: &'static str },

    /// RATE or DELTA requested on a set without a store
    #[error("integrations built with no store can't use deltas and rates")]
    NoStorerConfigured,

    /// Metric sets must carry an event type
    #[error("event type can't be empty")]
    EmptyEventType,
}

impl MetricError {
    pub(crate) fn non_string(name: &str) -> Self {
        Self::InvalidValueType {
            name: name.to_string(),
            reason: "non-string source type for attribute",
        }
    }

    pub(crate) fn non_numeric(name: &str) -> Self {
        Self::InvalidValueType {
            name: name.to_string(),
            reason: "non-numeric source type for metric",
        }
    }

    pub(crate) fn non_finite(name: &str) -> Self {
        Self::InvalidValueType {
            name: name.to_string(),
            reason: "non-finite value for metric",
        }
    }
}

/// Errors related to the persistent store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Backing file exists but can't be read or parsed
    #[error("corrupt store file {path}: {reason}")]
    LoadCorrupt { path: String, reason: String },

    /// Backing file could not be written
    #[error("can't save store file {path}: {reason}")]
    SaveFailed { path: String, reason: String },

    /// Store directory could not be created
    #[error("can't create store directory {path}: {reason}")]
    CreateDir { path: String, reason: String },
}

impl StoreError {
    pub(crate) fn load_corrupt(path: &Path, reason: impl ToString) -> Self {
        Self::LoadCorrupt {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn save_failed(path: &Path, reason: impl ToString) -> Self {
        Self::SaveFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn create_dir(path: &Path, reason: impl ToString) -> Self {
        Self::CreateDir {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while building or publishing an integration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// Builder configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote entities need both a name and a namespace
    #[error("entity name and namespace are required when defining one")]
    EntityMetadataRequired,

    /// Metric set creation failed
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// Store creation or save failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payload could not be encoded
    #[error("can't serialize payload: {0}")]
    Serialize(String),

    /// Payload could not be written to the output
    #[error("can't write payload: {0}")]
    Write(String),
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            MetricError::non_string("foo").to_string(),
            "non-string source type for attribute foo"
        );
        assert_eq!(
            MetricError::non_numeric("foo").to_string(),
            "non-numeric source type for metric foo"
        );
        assert_eq!(
            MetricError::NoStorerConfigured.to_string(),
            "integrations built with no store can't use deltas and rates"
        );
        let err = MetricError::UnknownSourceType {
            name: "foo".to_string(),
            code: 666,
        };
        assert!(err.to_string().contains("666"));
    }

    #[test]
    fn test_error_conversion() {
        let metric_err = MetricError::EmptyEventType;
        let err: IntegraError = metric_err.into();
        assert!(matches!(err, IntegraError::Metric(_)));

        let store_err = StoreError::save_failed(Path::new("/tmp/x.json"), "disk full");
        let integration_err: IntegrationError = store_err.clone().into();
        assert_eq!(integration_err.to_string(), store_err.to_string());
    }
}
