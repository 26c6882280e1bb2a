// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Time sources
//!
//! Every place that needs "now" takes a [`Clock`] at construction, so rate and
//! delta math can be made deterministic under test.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared default clock
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Deterministic clock advancing a fixed step on each call
///
/// The first call returns the start instant; each later call returns the
/// previous instant plus `step`.
#[derive(Debug)]
pub struct SteppingClock {
    step: Duration,
    state: Mutex<(DateTime<Utc>, bool)>,
}

impl SteppingClock {
    /// Clock starting at `start`, advancing by `step`
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            step,
            state: Mutex::new((start, false)),
        }
    }

    /// Clock starting now, advancing one second per call
    pub fn per_second() -> Self {
        Self::new(Utc::now(), Duration::seconds(1))
    }

    /// Move the clock forward without consuming a tick
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += by;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.1 {
            state.0 += self.step;
        } else {
            state.1 = true;
        }
        state.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepping_clock_advances_per_call() {
        let start = Utc::now();
        let clock = SteppingClock::new(start, Duration::seconds(1));

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(1));
        assert_eq!(clock.now(), start + Duration::seconds(2));
    }

    #[test]
    fn test_stepping_clock_advance() {
        let start = Utc::now();
        let clock = SteppingClock::new(start, Duration::seconds(1));

        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = system_clock();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
