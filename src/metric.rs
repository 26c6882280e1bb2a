// Integra - Stateful metrics core for integration agents
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Metric sets
//!
//! A [`MetricSet`] holds the values of one observation, tagged by its event
//! type. Each value is declared with a [`SourceType`]:
//!
//! - `Gauge`: absolute snapshot, stored as given
//! - `Rate`: change per second since the previous sample
//! - `Delta`: change since the previous sample
//! - `Attribute`: opaque string label
//!
//! Rates and deltas read the previous raw sample from the bound store and
//! write the new one back, so they carry over between agent runs when the
//! store is durable. The first sample of a key yields `0`.
//!
//! Sets serialize to a JSON object with keys in lexicographic order, so equal
//! sets always produce identical bytes.

use crate::error::MetricError;
use crate::persist::{self, SharedStorer};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Key under which a set records its event type
pub const EVENT_TYPE_KEY: &str = "event_type";

/// Integers up to this magnitude are written without a fractional part
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// Declared semantic kind of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SourceType {
    /// Absolute snapshot
    Gauge = 0,
    /// Change per second
    Rate = 1,
    /// Raw change
    Delta = 2,
    /// String label
    Attribute = 3,
}

impl SourceType {
    /// Convert from a numeric code
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Gauge),
            1 => Some(Self::Rate),
            2 => Some(Self::Delta),
            3 => Some(Self::Attribute),
            _ => None,
        }
    }

    /// Numeric code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether values of this type are derived from a stored baseline
    pub fn is_stateful(self) -> bool {
        matches!(self, Self::Rate | Self::Delta)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gauge => "GAUGE",
            Self::Rate => "RATE",
            Self::Delta => "DELTA",
            Self::Attribute => "ATTRIBUTE",
        };
        f.write_str(name)
    }
}

/// A metric value: number or string
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// String value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for MetricValue {
                fn from(v: $t) -> Self {
                    Self::Number(v as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i64, i32, i16, i8, u64, u32, u16, u8, usize, isize);

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Values of one observation, bound to an optional baseline store
pub struct MetricSet {
    metrics: BTreeMap<String, MetricValue>,
    storer: Option<SharedStorer>,
}

impl MetricSet {
    /// Create a set for `event_type`
    ///
    /// Without a store, `Rate` and `Delta` metrics are rejected.
    pub fn new(event_type: &str, storer: Option<SharedStorer>) -> Result<Self, MetricError> {
        if event_type.is_empty() {
            return Err(MetricError::EmptyEventType);
        }
        let mut set = Self {
            metrics: BTreeMap::new(),
            storer,
        };
        set.set_metric(EVENT_TYPE_KEY, event_type, SourceType::Attribute)?;
        Ok(set)
    }

    /// Event type this set was created with
    ///
    /// A later `event_type` attribute replaces it, last write wins.
    pub fn event_type(&self) -> Option<&str> {
        self.metrics.get(EVENT_TYPE_KEY).and_then(MetricValue::as_str)
    }

    /// Record a metric
    ///
    /// Gauges and attributes are stored as given. Rates and deltas are derived
    /// from the store's baseline for `name`, and the raw value becomes the new
    /// baseline. A failed call leaves the set unchanged.
    ///
    /// Checks run in order: value kind against source type, then a bound
    /// store for rates and deltas, then finiteness.
    ///
    /// Reusing a name under different source types shares one baseline;
    /// callers should pick distinct names.
    pub fn set_metric(
        &mut self,
        name: &str,
        value: impl Into<MetricValue>,
        source_type: SourceType,
    ) -> Result<(), MetricError> {
        let value = value.into();

        let result = match (source_type, value) {
            (SourceType::Attribute, MetricValue::Text(s)) => MetricValue::Text(s),
            (SourceType::Attribute, MetricValue::Number(_)) => {
                return Err(MetricError::non_string(name))
            }
            (_, MetricValue::Text(_)) => return Err(MetricError::non_numeric(name)),
            (SourceType::Rate | SourceType::Delta, _) if self.storer.is_none() => {
                return Err(MetricError::NoStorerConfigured)
            }
            (_, MetricValue::Number(n)) if !n.is_finite() => {
                return Err(MetricError::non_finite(name))
            }
            (SourceType::Gauge, MetricValue::Number(n)) => MetricValue::Number(n),
            (stateful, MetricValue::Number(n)) => {
                MetricValue::Number(self.derive(name, n, stateful)?)
            }
        };

        self.metrics.insert(name.to_string(), result);
        Ok(())
    }

    /// Record a metric whose source type arrives as a numeric code
    pub fn set_metric_code(
        &mut self,
        name: &str,
        value: impl Into<MetricValue>,
        code: u32,
    ) -> Result<(), MetricError> {
        let source_type = SourceType::from_code(code).ok_or_else(|| {
            MetricError::UnknownSourceType {
                name: name.to_string(),
                code,
            }
        })?;
        self.set_metric(name, value, source_type)
    }

    /// Rate or delta of `value` against the stored baseline
    fn derive(&self, name: &str, value: f64, source_type: SourceType) -> Result<f64, MetricError> {
        let storer = self
            .storer
            .as_ref()
            .ok_or(MetricError::NoStorerConfigured)?;
        let mut store = persist::lock(storer);

        let previous = store.get(name);
        let now = store.set(name, value);

        let Some(previous) = previous else {
            return Ok(0.0);
        };

        // Negative elapsed time fails the conversion and counts as zero
        let elapsed = (now - previous.timestamp)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        if elapsed <= 0.0 {
            return Ok(0.0);
        }

        let change = value - previous.value;
        Ok(match source_type {
            SourceType::Rate => change / elapsed,
            _ => change,
        })
    }

    /// Value recorded under `name`
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// All recorded values, event type included
    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    /// Number of recorded values, event type included
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Always false: a set holds at least its event type
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to compact JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for MetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.metrics.serialize(serializer)
    }
}

impl fmt::Debug for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSet")
            .field("metrics", &self.metrics)
            .field("has_storer", &self.storer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppingClock;
    use crate::persist::{shared, InMemoryStore};
    use approx::assert_relative_eq;
    use chrono::Duration;
    use std::sync::Arc;

    fn stepping_store() -> SharedStorer {
        shared(InMemoryStore::with_clock(Arc::new(SteppingClock::per_second())))
    }

    fn stored(storer: &SharedStorer, key: &str) -> Option<f64> {
        persist::lock(storer).get(key).map(|e| e.value)
    }

    #[test]
    fn test_gauge_without_storer() {
        let mut ms = MetricSet::new("some-event-type", None).unwrap();
        ms.set_metric("key", 10, SourceType::Gauge).unwrap();

        assert_eq!(ms.get("key"), Some(&MetricValue::Number(10.0)));
    }

    #[test]
    fn test_attribute() {
        let mut ms = MetricSet::new("some-event-type", None).unwrap();
        ms.set_metric("key", "some-attribute", SourceType::Attribute)
            .unwrap();

        assert_eq!(ms.get("key").and_then(MetricValue::as_str), Some("some-attribute"));
    }

    #[test]
    fn test_empty_event_type() {
        assert_eq!(
            MetricSet::new("", None).unwrap_err(),
            MetricError::EmptyEventType
        );
    }

    #[test]
    fn test_event_type_recorded() {
        let ms = MetricSet::new("RedisSample", None).unwrap();
        assert_eq!(ms.event_type(), Some("RedisSample"));
        assert_eq!(ms.len(), 1);
    }

    #[test]
    fn test_caches_rates_and_deltas() {
        let cases: [(&str, &str, f64, f64, f64); 3] = [
            ("1st data in key", "key1", 0.22323333, 0.0, 0.22323333),
            ("1st data in key", "key2", 100.0, 0.0, 100.0),
            ("2nd data in key", "key2", 110.0, 10.0, 110.0),
        ];

        let storer = stepping_store();
        for source_type in [SourceType::Delta, SourceType::Rate] {
            let mut ms = MetricSet::new("some-event-type", Some(storer.clone())).unwrap();

            for (case, key, value, out, cache) in cases {
                let key = format!("{}:{}", key, source_type.code());
                ms.set_metric(&key, value, source_type).unwrap();

                let got = ms.get(&key).and_then(MetricValue::as_f64).unwrap();
                assert_relative_eq!(got, out);
                assert_eq!(stored(&storer, &key), Some(cache), "{} {}", case, key);
            }
        }
    }

    #[test]
    fn test_rate_divides_by_elapsed_seconds() {
        let clock = Arc::new(SteppingClock::new(chrono::Utc::now(), Duration::seconds(4)));
        let storer = shared(InMemoryStore::with_clock(clock));
        let mut ms = MetricSet::new("net", Some(storer)).unwrap();

        ms.set_metric("bytes", 1000, SourceType::Rate).unwrap();
        ms.set_metric("bytes", 1200, SourceType::Rate).unwrap();

        assert_relative_eq!(ms.get("bytes").and_then(MetricValue::as_f64).unwrap(), 50.0);
    }

    #[test]
    fn test_zero_elapsed_yields_zero() {
        let clock = Arc::new(SteppingClock::new(chrono::Utc::now(), Duration::zero()));
        let storer = shared(InMemoryStore::with_clock(clock));
        let mut ms = MetricSet::new("net", Some(storer.clone())).unwrap();

        ms.set_metric("bytes", 1000, SourceType::Rate).unwrap();
        ms.set_metric("bytes", 1200, SourceType::Rate).unwrap();

        assert_eq!(ms.get("bytes"), Some(&MetricValue::Number(0.0)));
        assert_eq!(stored(&storer, "bytes"), Some(1200.0));
    }

    #[test]
    fn test_nil_storer() {
        let mut ms = MetricSet::new("some-event-type", None).unwrap();

        assert_eq!(
            ms.set_metric("foo", 1, SourceType::Rate),
            Err(MetricError::NoStorerConfigured)
        );
        assert_eq!(
            ms.set_metric("foo", 1, SourceType::Delta),
            Err(MetricError::NoStorerConfigured)
        );
        assert!(ms.get("foo").is_none());
    }

    #[test]
    fn test_nil_storer_checked_before_value() {
        let mut ms = MetricSet::new("some-event-type", None).unwrap();

        for value in [f64::NAN, f64::INFINITY] {
            assert_eq!(
                ms.set_metric("x", value, SourceType::Rate),
                Err(MetricError::NoStorerConfigured)
            );
            assert_eq!(
                ms.set_metric("x", value, SourceType::Delta),
                Err(MetricError::NoStorerConfigured)
            );
        }
        assert!(matches!(
            ms.set_metric("x", f64::NAN, SourceType::Gauge),
            Err(MetricError::InvalidValueType { .. })
        ));
    }

    #[test]
    fn test_incorrect_metric_type() {
        let mut ms = MetricSet::new("some-event-type", Some(stepping_store())).unwrap();

        for source_type in [SourceType::Rate, SourceType::Delta, SourceType::Gauge] {
            let err = ms.set_metric("foo", "bar", source_type).unwrap_err();
            assert_eq!(err.to_string(), "non-numeric source type for metric foo");
        }

        let err = ms.set_metric("foo", 1, SourceType::Attribute).unwrap_err();
        assert_eq!(err.to_string(), "non-string source type for attribute foo");

        let err = ms.set_metric_code("foo", 1, 666).unwrap_err();
        assert_eq!(
            err,
            MetricError::UnknownSourceType {
                name: "foo".to_string(),
                code: 666
            }
        );

        assert!(ms.get("foo").is_none());
    }

    #[test]
    fn test_failed_call_keeps_previous_value() {
        let mut ms = MetricSet::new("some-event-type", None).unwrap();
        ms.set_metric("foo", 3, SourceType::Gauge).unwrap();

        assert!(ms.set_metric("foo", "bar", SourceType::Gauge).is_err());
        assert!(ms.set_metric("foo", f64::NAN, SourceType::Gauge).is_err());
        assert_eq!(ms.get("foo"), Some(&MetricValue::Number(3.0)));

        ms.set_metric("other", 1, SourceType::Gauge).unwrap();
        assert_eq!(ms.len(), 3);
    }

    #[test]
    fn test_source_type_codes() {
        for code in 0..4 {
            assert_eq!(SourceType::from_code(code).map(SourceType::code), Some(code));
        }
        assert_eq!(SourceType::from_code(4), None);
        assert!(SourceType::Rate.is_stateful());
        assert!(!SourceType::Attribute.is_stateful());
        assert_eq!(SourceType::Delta.to_string(), "DELTA");
    }

    #[test]
    fn test_marshal_json() {
        let mut ms = MetricSet::new("some-event-type", Some(stepping_store())).unwrap();

        ms.set_metric("foo", 1, SourceType::Rate).unwrap();
        ms.set_metric("bar", 1, SourceType::Delta).unwrap();
        ms.set_metric("baz", 1, SourceType::Gauge).unwrap();
        ms.set_metric("quux", "bar", SourceType::Attribute).unwrap();

        assert_eq!(
            ms.to_json_bytes().unwrap(),
            br#"{"bar":0,"baz":1,"event_type":"some-event-type","foo":0,"quux":"bar"}"#.to_vec()
        );
    }

    #[test]
    fn test_fractional_values_keep_fraction() {
        let mut ms = MetricSet::new("e", None).unwrap();
        ms.set_metric("load", 0.25, SourceType::Gauge).unwrap();
        ms.set_metric("neg", -3, SourceType::Gauge).unwrap();

        assert_eq!(
            ms.to_json().unwrap(),
            r#"{"event_type":"e","load":0.25,"neg":-3}"#
        );
    }
}
