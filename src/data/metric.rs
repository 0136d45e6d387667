//! Validated node telemetry records.
//!
//! Raw records from the API are converted into [`NodeMetric`] here. Records
//! that are missing required fields or carry non-numeric counts are skipped
//! with a warning rather than failing the whole payload.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::source::{Numeric, RawNodeMetric};

/// Errors raised while validating telemetry input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    /// A required field was absent or null.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A numeric field could not be interpreted.
    #[error("invalid value for `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// An address did not have the four-octet IPv4 shape.
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),

    /// The record itself did not have the expected JSON shape.
    #[error("unreadable record: {0}")]
    InvalidRecord(String),

    /// A timestamp was neither RFC 3339 nor epoch milliseconds.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Node software version.
///
/// `pre_release == 0` is a release build; any other value is a development
/// build number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub pre_release: u32,
}

impl NodeVersion {
    pub fn new(major: u32, minor: u32, patch: u32, pre_release: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release,
        }
    }

    /// Returns true for development builds.
    pub fn is_pre_release(&self) -> bool {
        self.pre_release != 0
    }

    /// Display label: `"major.minor.patch"`, with `"_DB{n}"` for development builds.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.is_pre_release() {
            write!(f, "_DB{}", self.pre_release)?;
        }
        Ok(())
    }
}

/// A validated telemetry record for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetric {
    pub node_id: String,
    pub address: String,
    pub block_count: u64,
    pub cemented_count: u64,
    pub version: NodeVersion,
    pub hourly_blocks: Option<f64>,
    pub daily_blocks: Option<f64>,
    pub hourly_cemented: Option<f64>,
    pub daily_cemented: Option<f64>,
    pub peer_count: Option<u64>,
    /// Node uptime in seconds.
    pub uptime: Option<u64>,
    /// Telemetry timestamp in epoch milliseconds.
    pub timestamp: Option<u64>,
}

impl NodeMetric {
    /// Minimal constructor; optional fields start empty.
    pub fn new(
        node_id: impl Into<String>,
        address: impl Into<String>,
        block_count: u64,
        cemented_count: u64,
        version: NodeVersion,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
            block_count,
            cemented_count,
            version,
            hourly_blocks: None,
            daily_blocks: None,
            hourly_cemented: None,
            daily_cemented: None,
            peer_count: None,
            uptime: None,
            timestamp: None,
        }
    }
}

impl TryFrom<RawNodeMetric> for NodeMetric {
    type Error = MetricError;

    fn try_from(raw: RawNodeMetric) -> Result<Self, Self::Error> {
        if let Some(reason) = raw.invalid {
            return Err(MetricError::InvalidRecord(reason));
        }

        let version = NodeVersion {
            major: version_part("major_version", raw.major_version.as_ref())?,
            minor: version_part("minor_version", raw.minor_version.as_ref())?,
            patch: version_part("patch_version", raw.patch_version.as_ref())?,
            pre_release: version_part("pre_release_version", raw.pre_release_version.as_ref())?,
        };

        Ok(Self {
            node_id: raw.node_id.ok_or(MetricError::MissingField("node_id"))?,
            address: raw.address.ok_or(MetricError::MissingField("address"))?,
            block_count: required_count("block_count", raw.block_count.as_ref())?,
            cemented_count: required_count("cemented_count", raw.cemented_count.as_ref())?,
            version,
            hourly_blocks: optional_rate("hourly_blocks", raw.hourly_blocks.as_ref())?,
            daily_blocks: optional_rate("daily_blocks", raw.daily_blocks.as_ref())?,
            hourly_cemented: optional_rate("hourly_cemented", raw.hourly_cemented.as_ref())?,
            daily_cemented: optional_rate("daily_cemented", raw.daily_cemented.as_ref())?,
            peer_count: optional_count("peer_count", raw.peer_count.as_ref())?,
            uptime: optional_count("uptime", raw.uptime.as_ref())?,
            timestamp: optional_count("timestamp", raw.timestamp.as_ref())?,
        })
    }
}

fn required_count(field: &'static str, value: Option<&Numeric>) -> Result<u64, MetricError> {
    let value = value.ok_or(MetricError::MissingField(field))?;
    value.as_u64().ok_or_else(|| MetricError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn optional_count(field: &'static str, value: Option<&Numeric>) -> Result<Option<u64>, MetricError> {
    value.map(|v| required_count(field, Some(v))).transpose()
}

fn version_part(field: &'static str, value: Option<&Numeric>) -> Result<u32, MetricError> {
    let n = required_count(field, value)?;
    u32::try_from(n).map_err(|_| MetricError::InvalidNumber {
        field,
        value: n.to_string(),
    })
}

fn optional_rate(field: &'static str, value: Option<&Numeric>) -> Result<Option<f64>, MetricError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.as_f64() {
        Some(rate) if rate.is_finite() && rate >= 0.0 => Ok(Some(rate)),
        _ => Err(MetricError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

/// Validated records plus the number of records that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetrics {
    pub metrics: Vec<NodeMetric>,
    pub skipped: usize,
}

/// Validate a batch of raw records, skipping (and logging) malformed ones.
pub fn parse_metrics(raw: Vec<RawNodeMetric>) -> ParsedMetrics {
    let mut parsed = ParsedMetrics::default();

    for (index, record) in raw.into_iter().enumerate() {
        let node_id = record.node_id.clone();
        match NodeMetric::try_from(record) {
            Ok(metric) => parsed.metrics.push(metric),
            Err(e) => {
                warn!(index, node_id = node_id.as_deref().unwrap_or("?"), error = %e, "skipping malformed metric record");
                parsed.skipped += 1;
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(node_id: &str, blocks: &str, cemented: &str) -> RawNodeMetric {
        RawNodeMetric {
            node_id: Some(node_id.to_string()),
            address: Some("::ffff:10.1.2.3".to_string()),
            block_count: Some(Numeric::Text(blocks.to_string())),
            cemented_count: Some(Numeric::Text(cemented.to_string())),
            major_version: Some(Numeric::Text("25".to_string())),
            minor_version: Some(Numeric::Text("1".to_string())),
            patch_version: Some(Numeric::Text("0".to_string())),
            pre_release_version: Some(Numeric::Text("0".to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_version_labels() {
        assert_eq!(NodeVersion::new(1, 2, 0, 0).label(), "1.2.0");
        assert_eq!(NodeVersion::new(1, 2, 0, 3).label(), "1.2.0_DB3");
    }

    #[test]
    fn test_try_from_string_counts() {
        let metric = NodeMetric::try_from(raw("A", "1000", "990")).unwrap();
        assert_eq!(metric.block_count, 1000);
        assert_eq!(metric.cemented_count, 990);
        assert_eq!(metric.version, NodeVersion::new(25, 1, 0, 0));
        assert_eq!(metric.address, "::ffff:10.1.2.3");
    }

    #[test]
    fn test_try_from_missing_field() {
        let mut record = raw("A", "1", "1");
        record.cemented_count = None;
        assert_eq!(
            NodeMetric::try_from(record),
            Err(MetricError::MissingField("cemented_count"))
        );
    }

    #[test]
    fn test_try_from_non_numeric_count() {
        let err = NodeMetric::try_from(raw("A", "lots", "1")).unwrap_err();
        assert!(matches!(err, MetricError::InvalidNumber { field: "block_count", .. }));
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut record = raw("A", "1", "1");
        record.hourly_blocks = Some(Numeric::Float(-1.0));
        assert!(NodeMetric::try_from(record).is_err());

        let mut record = raw("A", "1", "1");
        record.daily_cemented = Some(Numeric::Float(3.25));
        assert_eq!(NodeMetric::try_from(record).unwrap().daily_cemented, Some(3.25));
    }

    #[test]
    fn test_parse_metrics_skips_bad_records() {
        let mut broken = raw("B", "1", "1");
        broken.node_id = None;

        let parsed = parse_metrics(vec![raw("A", "10", "5"), broken, raw("C", "x", "1")]);
        assert_eq!(parsed.metrics.len(), 1);
        assert_eq!(parsed.metrics[0].node_id, "A");
        assert_eq!(parsed.skipped, 2);
    }
}
