// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Integration builder

use super::{Integration, Locker};
use crate::args::DefaultArgs;
use crate::error::IntegrationError;
use crate::persist::{self, default_path, FileStore, InMemoryStore, SharedStorer, Storer};
use crate::PROTOCOL_VERSION;
use std::io::{self, Write};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Where the integration keeps its baselines
enum StoreChoice {
    /// File store at `default_path(name)`
    Default,
    Custom(SharedStorer),
    Disabled,
}

/// Fluent configuration for an [`Integration`]
pub struct IntegrationBuilder {
    name: String,
    version: String,
    writer: Box<dyn Write + Send>,
    arguments: Option<DefaultArgs>,
    store: StoreChoice,
    locker: Locker,
}

impl IntegrationBuilder {
    /// Builder for integration `name` at `version`, writing to stdout
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            writer: Box::new(io::stdout()),
            arguments: None,
            store: StoreChoice::Default,
            locker: Locker::Disabled,
        }
    }

    /// Allow the built integration to be shared between threads
    pub fn synchronized(mut self) -> Self {
        self.locker = Locker::Mutex;
        self
    }

    /// Output for the published payload
    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Parsed default arguments; without them every flag is off
    pub fn arguments(mut self, arguments: DefaultArgs) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Use `storer` for baselines
    pub fn storer(mut self, storer: impl Storer + Send + 'static) -> Self {
        self.store = StoreChoice::Custom(persist::shared(storer));
        self
    }

    /// Use an already shared store
    pub fn shared_storer(mut self, storer: SharedStorer) -> Self {
        self.store = StoreChoice::Custom(storer);
        self
    }

    /// Keep baselines in memory only
    pub fn in_memory_store(self) -> Self {
        self.storer(InMemoryStore::new())
    }

    /// No store; rates and deltas will be rejected
    pub fn no_store(mut self) -> Self {
        self.store = StoreChoice::Disabled;
        self
    }

    /// Validate the configuration and build the integration
    pub fn build(self) -> Result<Integration, IntegrationError> {
        if self.name.is_empty() {
            return Err(IntegrationError::InvalidConfig(
                "integration name can't be empty".to_string(),
            ));
        }

        let arguments = self.arguments.unwrap_or_default().resolved();
        init_logging(arguments.verbose);

        let storer = match self.store {
            StoreChoice::Default => {
                let store = FileStore::open(default_path(&self.name))?;
                Some(persist::shared(store))
            }
            StoreChoice::Custom(storer) => Some(storer),
            StoreChoice::Disabled => None,
        };

        debug!(
            integration = %self.name,
            version = %self.version,
            store = storer.is_some(),
            locker = ?self.locker,
            "integration built"
        );

        Ok(Integration {
            name: self.name,
            protocol_version: PROTOCOL_VERSION,
            integration_version: self.version,
            entities: Vec::new(),
            storer,
            writer: self.writer,
            pretty: arguments.pretty,
            publish_metrics: arguments.has_metrics(),
            locker: self.locker,
        })
    }
}

/// Install a stderr subscriber unless the host already has one
fn init_logging(verbose: bool) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, directives.as_deref()))
        .with_writer(io::stderr)
        .try_init();
}

/// `RUST_LOG` directives, or `INFO` without them; `verbose` raises the
/// default level to `DEBUG` either way
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    let filter = directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(Level::INFO.into()));
    if verbose {
        filter.add_directive(Level::DEBUG.into())
    } else {
        filter
    }
}
