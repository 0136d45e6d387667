//! Wire types for the metrics API.
//!
//! These types mirror the JSON served by the dashboard backend. They are
//! deliberately loose: every field is optional and numeric fields accept
//! either JSON numbers or decimal strings, because the node telemetry RPC
//! reports counts as strings. Validation into [`NodeMetric`] happens in the
//! data layer so a single bad record can be skipped instead of failing the
//! whole payload.
//!
//! [`NodeMetric`]: crate::data::NodeMetric

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A numeric field that may be encoded as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl Numeric {
    /// Interpret the value as a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Numeric::Integer(n) => Some(*n),
            Numeric::Float(_) => None,
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret the value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Integer(n) => Some(*n as f64),
            Numeric::Float(f) => Some(*f),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u64> for Numeric {
    fn from(n: u64) -> Self {
        Numeric::Integer(n)
    }
}

impl std::fmt::Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Numeric::Integer(n) => write!(f, "{}", n),
            Numeric::Float(x) => write!(f, "{}", x),
            Numeric::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Response body of `/get_metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    /// One record per node.
    #[serde(default, deserialize_with = "records_or_invalid")]
    pub metrics: Vec<RawNodeMetric>,

    /// Highest block count across the network, if the server computed it.
    #[serde(
        default,
        deserialize_with = "numeric_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_block_count: Option<Numeric>,

    /// Highest cemented count across the network, if the server computed it.
    #[serde(
        default,
        deserialize_with = "numeric_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_cemented_count: Option<Numeric>,
}

/// Read each record on its own so one wrongly typed entry is flagged
/// instead of rejecting the payload.
fn records_or_invalid<'de, D>(deserializer: D) -> Result<Vec<RawNodeMetric>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().map(RawNodeMetric::from_value).collect())
}

/// Maxima of the wrong type are ignored; they are recomputed from the records.
fn numeric_or_none<'de, D>(deserializer: D) -> Result<Option<Numeric>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A node telemetry record as received, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawNodeMetric {
    pub node_id: Option<String>,
    pub address: Option<String>,
    pub block_count: Option<Numeric>,
    pub cemented_count: Option<Numeric>,
    pub major_version: Option<Numeric>,
    pub minor_version: Option<Numeric>,
    pub patch_version: Option<Numeric>,
    pub pre_release_version: Option<Numeric>,
    pub hourly_blocks: Option<Numeric>,
    pub daily_blocks: Option<Numeric>,
    pub hourly_cemented: Option<Numeric>,
    pub daily_cemented: Option<Numeric>,
    pub peer_count: Option<Numeric>,
    pub uptime: Option<Numeric>,
    pub timestamp: Option<Numeric>,

    /// Set when the record did not have the expected shape.
    #[serde(skip)]
    pub invalid: Option<String>,
}

impl RawNodeMetric {
    /// Decode one record, keeping the decode error on failure.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<RawNodeMetric>(value.clone()) {
            Ok(record) => record,
            Err(e) => RawNodeMetric {
                node_id: value.get("node_id").and_then(Value::as_str).map(str::to_string),
                invalid: Some(e.to_string()),
                ..Default::default()
            },
        }
    }
}

/// A point-in-time timestamp: RFC 3339 text or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

/// One entry of the `/node_data/{nodeId}` time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSample {
    pub timestamp: Timestamp,
    pub block_count: Numeric,
    pub cemented_count: Numeric,
    #[serde(default)]
    pub version: Option<String>,
}

/// Result of an on-demand `/node_data` request.
#[derive(Debug, Clone)]
pub struct NodeHistory {
    pub node_id: String,
    pub samples: Result<Vec<NodeSample>, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_telemetry_strings() {
        let json = r#"{
            "metrics": [
                {
                    "node_id": "NODE_A",
                    "address": "::ffff:10.0.0.1",
                    "block_count": "1000",
                    "cemented_count": "990",
                    "major_version": "25",
                    "minor_version": "1",
                    "patch_version": "0",
                    "pre_release_version": "0",
                    "peer_count": "180",
                    "maker": "0",
                    "genesis_block": "ABC"
                }
            ],
            "max_block_count": 1000,
            "max_cemented_count": 990
        }"#;

        let payload: MetricsPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.metrics.len(), 1);
        assert_eq!(payload.max_block_count.as_ref().and_then(Numeric::as_u64), Some(1000));

        let metric = &payload.metrics[0];
        assert_eq!(metric.node_id.as_deref(), Some("NODE_A"));
        assert_eq!(metric.block_count.as_ref().and_then(Numeric::as_u64), Some(1000));
        assert!(metric.hourly_blocks.is_none());
    }

    #[test]
    fn test_deserialize_mixed_rates() {
        let json = r#"{"metrics": [{"hourly_blocks": 12.5, "daily_blocks": null, "block_count": 7}]}"#;
        let payload: MetricsPayload = serde_json::from_str(json).unwrap();
        let metric = &payload.metrics[0];
        assert_eq!(metric.hourly_blocks.as_ref().and_then(Numeric::as_f64), Some(12.5));
        assert!(metric.daily_blocks.is_none());
        assert_eq!(metric.block_count, Some(Numeric::Integer(7)));
        assert!(payload.max_block_count.is_none());
    }

    #[test]
    fn test_deserialize_node_samples() {
        let json = r#"[
            {"timestamp": "2024-03-01T12:00:00Z", "block_count": 10, "cemented_count": 9, "version": "25.1.0"},
            {"timestamp": 1709294400000, "block_count": "11", "cemented_count": "10"}
        ]"#;
        let samples: Vec<NodeSample> = serde_json::from_str(json).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(matches!(samples[0].timestamp, Timestamp::Text(_)));
        assert_eq!(samples[1].timestamp, Timestamp::Millis(1_709_294_400_000));
        assert!(samples[1].version.is_none());
    }

    #[test]
    fn test_wrongly_typed_records_are_flagged() {
        let json = r#"{
            "metrics": [
                {"node_id": "A", "address": "10.0.0.1", "block_count": 5, "cemented_count": 5},
                {"node_id": "B", "block_count": true},
                {"node_id": 42},
                null
            ],
            "max_block_count": [1]
        }"#;

        let payload: MetricsPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.metrics.len(), 4);
        assert!(payload.metrics[0].invalid.is_none());
        assert_eq!(payload.metrics[1].node_id.as_deref(), Some("B"));
        assert!(payload.metrics[1].invalid.is_some());
        assert!(payload.metrics[2].node_id.is_none());
        assert!(payload.metrics[2].invalid.is_some());
        assert!(payload.metrics[3].invalid.is_some());
        assert!(payload.max_block_count.is_none());
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Numeric::Text(" 42 ".into()).as_u64(), Some(42));
        assert_eq!(Numeric::Text("abc".into()).as_u64(), None);
        assert_eq!(Numeric::Float(1.5).as_u64(), None);
        assert_eq!(Numeric::Integer(3).as_f64(), Some(3.0));
    }
}
