// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Default integration arguments
//!
//! Every integration accepts these flags, from the command line or from the
//! environment. Integrations with their own options flatten [`DefaultArgs`]
//! into their own parser:
//!
//! ```rust
//! use clap::Parser;
//! use integra::DefaultArgs;
//!
//! #[derive(Parser, Debug)]
//! struct RedisArgs {
//!     #[command(flatten)]
//!     default: DefaultArgs,
//!
//!     /// Redis host
//!     #[arg(long, default_value = "localhost")]
//!     hostname: String,
//! }
//!
//! let args = RedisArgs::parse_from(["nri-redis", "--pretty", "--hostname", "redis-01"]);
//! assert!(args.default.pretty);
//! assert_eq!(args.hostname, "redis-01");
//! ```

use clap::builder::FalseyValueParser;
use clap::Parser;

/// Flags shared by every integration
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(about = "Integration default arguments")]
pub struct DefaultArgs {
    /// Print more information to logs
    #[arg(long, env = "VERBOSE", value_parser = FalseyValueParser::new())]
    pub verbose: bool,

    /// Print pretty formatted JSON
    #[arg(long, env = "PRETTY", value_parser = FalseyValueParser::new())]
    pub pretty: bool,

    /// Publish all kind of data (metrics, inventory, events)
    #[arg(long, env = "ALL", value_parser = FalseyValueParser::new())]
    pub all: bool,

    /// Publish metrics data
    #[arg(long, env = "METRICS", value_parser = FalseyValueParser::new())]
    pub metrics: bool,

    /// Publish inventory data
    #[arg(long, env = "INVENTORY", value_parser = FalseyValueParser::new())]
    pub inventory: bool,

    /// Publish events data
    #[arg(long, env = "EVENTS", value_parser = FalseyValueParser::new())]
    pub events: bool,
}

impl DefaultArgs {
    /// Apply defaults: selecting no data kind selects all of them
    pub fn resolved(mut self) -> Self {
        if !self.metrics && !self.inventory && !self.events {
            self.all = true;
        }
        self
    }

    /// Whether metrics should be published
    pub fn has_metrics(&self) -> bool {
        self.all || self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_select_all() {
        let args = DefaultArgs::try_parse_from(["integration"])
            .unwrap()
            .resolved();

        assert!(args.all);
        assert!(args.has_metrics());
        assert!(!args.verbose);
        assert!(!args.pretty);
    }

    #[test]
    fn test_flags() {
        let args = DefaultArgs::try_parse_from(["integration", "--verbose", "--pretty", "--metrics"])
            .unwrap()
            .resolved();

        assert!(args.verbose);
        assert!(args.pretty);
        assert!(args.metrics);
        assert!(!args.all);
        assert!(args.has_metrics());
    }

    #[test]
    fn test_inventory_only_skips_metrics() {
        let args = DefaultArgs::try_parse_from(["integration", "--inventory"])
            .unwrap()
            .resolved();

        assert!(!args.has_metrics());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(DefaultArgs::try_parse_from(["integration", "--nope"]).is_err());
    }
}
