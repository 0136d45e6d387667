//! Per-node time series for the chart view and rate calculations.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use super::metric::{MetricError, NodeMetric};
use crate::source::{NodeSample, Timestamp};

/// Maximum number of samples kept per node.
const MAX_HISTORY_SIZE: usize = 120;

/// One point of a node's block/cemented series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub block_count: u64,
    pub cemented_count: u64,
    pub version: Option<String>,
}

impl TryFrom<&NodeSample> for HistoryPoint {
    type Error = MetricError;

    fn try_from(sample: &NodeSample) -> Result<Self, Self::Error> {
        let block_count = sample.block_count.as_u64().ok_or_else(|| MetricError::InvalidNumber {
            field: "block_count",
            value: sample.block_count.to_string(),
        })?;
        let cemented_count =
            sample.cemented_count.as_u64().ok_or_else(|| MetricError::InvalidNumber {
                field: "cemented_count",
                value: sample.cemented_count.to_string(),
            })?;

        Ok(Self {
            timestamp: parse_timestamp(&sample.timestamp)?,
            block_count,
            cemented_count,
            version: sample.version.clone(),
        })
    }
}

/// Parse an RFC 3339 string or epoch milliseconds.
pub fn parse_timestamp(ts: &Timestamp) -> Result<DateTime<Utc>, MetricError> {
    match ts {
        Timestamp::Millis(ms) => Utc
            .timestamp_millis_opt(*ms)
            .single()
            .ok_or_else(|| MetricError::InvalidTimestamp(ms.to_string())),
        Timestamp::Text(text) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Ok(dt.with_timezone(&Utc));
            }
            // Telemetry sometimes reports epoch millis as a string
            text.trim()
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| MetricError::InvalidTimestamp(text.clone()))
        }
    }
}

/// Convert a `/node_data` response into chart points, oldest first.
///
/// Samples that fail to parse are skipped with a warning.
pub fn points_from_samples(samples: &[NodeSample]) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = samples
        .iter()
        .filter_map(|s| match HistoryPoint::try_from(s) {
            Ok(point) => Some(point),
            Err(e) => {
                warn!(error = %e, "skipping malformed node sample");
                None
            }
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Locally recorded history of every polled payload.
///
/// Gives the chart view a series even when the backend offers no
/// `/node_data` endpoint, and backs the live block rate.
#[derive(Debug, Clone, Default)]
pub struct History {
    nodes: HashMap<String, VecDeque<HistoryPoint>>,
}

impl History {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample per node.
    ///
    /// Nodes missing from `metrics` have left the network and are dropped.
    pub fn record(&mut self, metrics: &[NodeMetric], at: DateTime<Utc>) {
        let present: HashSet<&str> = metrics.iter().map(|m| m.node_id.as_str()).collect();
        self.nodes.retain(|id, _| present.contains(id.as_str()));

        for metric in metrics {
            let series = self.nodes.entry(metric.node_id.clone()).or_default();
            series.push_back(HistoryPoint {
                timestamp: at,
                block_count: metric.block_count,
                cemented_count: metric.cemented_count,
                version: Some(metric.version.label()),
            });
            if series.len() > MAX_HISTORY_SIZE {
                series.pop_front();
            }
        }
    }

    /// Recorded points for a node, oldest first.
    pub fn series(&self, node_id: &str) -> Vec<HistoryPoint> {
        self.nodes.get(node_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of nodes with recorded samples.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of samples recorded for a node.
    pub fn len(&self, node_id: &str) -> usize {
        self.nodes.get(node_id).map_or(0, VecDeque::len)
    }

    /// Blocks per second between the last two samples.
    ///
    /// Returns None if there's not enough history to calculate a rate.
    pub fn get_block_rate(&self, node_id: &str) -> Option<f64> {
        let series = self.nodes.get(node_id)?;
        if series.len() < 2 {
            return None;
        }

        let current = series.back()?;
        let previous = series.get(series.len() - 2)?;
        let delta = current.block_count as f64 - previous.block_count as f64;
        let elapsed = (current.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;

        if elapsed > 0.0 {
            Some(delta / elapsed)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NodeVersion;
    use crate::source::Numeric;
    use chrono::Duration;

    fn metric(id: &str, blocks: u64) -> NodeMetric {
        NodeMetric::new(id, "1.2.3.4", blocks, blocks, NodeVersion::new(25, 0, 0, 0))
    }

    #[test]
    fn test_record_and_rate() {
        let mut history = History::new();
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        history.record(&[metric("a", 100)], t0);
        assert_eq!(history.get_block_rate("a"), None);

        history.record(&[metric("a", 160)], t0 + Duration::seconds(30));
        assert_eq!(history.get_block_rate("a"), Some(2.0));
        assert_eq!(history.len("a"), 2);
        assert_eq!(history.series("a")[1].version.as_deref(), Some("25.0.0"));
        assert!(history.series("missing").is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = History::new();
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for i in 0..(MAX_HISTORY_SIZE as u64 + 10) {
            history.record(&[metric("a", i)], t0 + Duration::seconds(i as i64));
        }
        assert_eq!(history.len("a"), MAX_HISTORY_SIZE);
        assert_eq!(history.series("a")[0].block_count, 10);
    }

    #[test]
    fn test_departed_nodes_are_dropped() {
        let mut history = History::new();
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        history.record(&[metric("a", 1), metric("b", 1)], t0);
        assert_eq!(history.node_count(), 2);

        history.record(&[metric("b", 2), metric("c", 1)], t0 + Duration::seconds(30));
        assert_eq!(history.node_count(), 2);
        assert_eq!(history.len("a"), 0);
        assert_eq!(history.len("b"), 2);
        assert_eq!(history.len("c"), 1);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.timestamp_opt(1_709_294_400, 0).unwrap();
        assert_eq!(parse_timestamp(&Timestamp::Millis(1_709_294_400_000)).unwrap(), expected);
        assert_eq!(
            parse_timestamp(&Timestamp::Text("2024-03-01T12:00:00Z".into())).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&Timestamp::Text("1709294400000".into())).unwrap(),
            expected
        );
        assert!(parse_timestamp(&Timestamp::Text("yesterday".into())).is_err());
    }

    #[test]
    fn test_points_from_samples_sorted_and_filtered() {
        let samples = vec![
            NodeSample {
                timestamp: Timestamp::Millis(2_000),
                block_count: Numeric::Integer(20),
                cemented_count: Numeric::Integer(19),
                version: None,
            },
            NodeSample {
                timestamp: Timestamp::Text("garbage".into()),
                block_count: Numeric::Integer(1),
                cemented_count: Numeric::Integer(1),
                version: None,
            },
            NodeSample {
                timestamp: Timestamp::Millis(1_000),
                block_count: Numeric::Text("10".into()),
                cemented_count: Numeric::Text("9".into()),
                version: Some("25.0.0".into()),
            },
        ];

        let points = points_from_samples(&samples);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].block_count, 10);
        assert_eq!(points[1].block_count, 20);
    }
}
