//! Result values: a metric either produced JSON or failed with a marker.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::MetricError;

const MARKER_PREFIX: &str = "[error in ";

/// Outcome of one metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Value(Value),
    Error { metric: String, error: MetricError },
}

impl MetricValue {
    pub fn error(metric: impl Into<String>, error: MetricError) -> Self {
        Self::Error {
            metric: metric.into(),
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error { .. } => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    /// Textual marker, e.g. `[error in melodic_entropy]: panicked: boom`.
    pub fn marker(&self) -> Option<String> {
        match self {
            Self::Value(_) => None,
            Self::Error { metric, error } => Some(format!("{MARKER_PREFIX}{metric}]: {error}")),
        }
    }

    fn parse_marker(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(MARKER_PREFIX)?;
        let (metric, description) = rest.split_once("]: ")?;
        Some(Self::error(metric, MetricError::Computation(description.to_string())))
    }
}

impl From<Value> for MetricValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Error { .. } => serializer.serialize_str(&self.marker().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Some(marker) = value.as_str().and_then(Self::parse_marker) {
            return Ok(marker);
        }
        Ok(Self::Value(value))
    }
}

/// Ordered mapping from metric name to outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricResult(BTreeMap<String, MetricValue>);

impl MetricResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.0.insert(name.into(), value);
    }

    /// Merge `other` into `self`; `other` wins on collisions.
    pub fn merge(&mut self, other: MetricResult) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.iter().filter(|(_, v)| v.is_error())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_serializes_as_marker() {
        let mut result = MetricResult::new();
        result.insert("melodic_entropy", MetricValue::Value(json!(2.585)));
        result.insert(
            "tension_curve",
            MetricValue::error("tension_curve", MetricError::Panicked("boom".into())),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["melodic_entropy"], json!(2.585));
        assert_eq!(json["tension_curve"], json!("[error in tension_curve]: panicked: boom"));
    }

    #[test]
    fn markers_survive_a_json_round_trip() {
        let mut result = MetricResult::new();
        result.insert(
            "chord_density",
            MetricValue::error("chord_density", MetricError::Computation("bad".into())),
        );
        let text = serde_json::to_string(&result).unwrap();
        let restored: MetricResult = serde_json::from_str(&text).unwrap();
        assert!(restored.get("chord_density").unwrap().is_error());
        assert_eq!(restored, result);
    }

    #[test]
    fn merge_is_last_write_wins() {
        let mut first = MetricResult::new();
        first.insert("duration_entropy", json!(1.0).into());
        let mut second = MetricResult::new();
        second.insert("duration_entropy", json!(2.0).into());

        first.merge(second);
        assert_eq!(first.get("duration_entropy").unwrap().as_f64(), Some(2.0));
    }
}
