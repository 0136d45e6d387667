//! Data models and processing for node telemetry.
//!
//! This module turns raw API payloads into the validated, classified
//! presentation model the UI renders.
//!
//! ## Submodules
//!
//! - [`address`]: Address redaction for display
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "30s", "500ms")
//! - [`export`]: JSON export of the current view
//! - [`history`]: Per-node time series for the chart view and rate calculations
//! - [`metric`]: Validated telemetry records ([`NodeMetric`], [`NodeVersion`])
//! - [`view_model`]: Classification, sorting and version filtering ([`ViewModel`])
//!
//! ## Data Flow
//!
//! ```text
//! MetricsPayload (raw JSON)
//!        │
//!        ▼
//! parse_metrics()  ──▶ skipped records (logged)
//!        │
//!        ▼
//! ViewModel::build_with_maxima()
//!        │
//!        ├──▶ bootstrapping / other (sorted by cemented %)
//!        ├──▶ version_counts (version filter options)
//!        │
//!        └──▶ History::record() (for the chart view)
//! ```

pub mod address;
pub mod duration;
pub mod export;
pub mod history;
pub mod metric;
pub mod view_model;

pub use address::redact_address;
pub use export::ExportDocument;
pub use history::{points_from_samples, History, HistoryPoint};
pub use metric::{parse_metrics, MetricError, NodeMetric, NodeVersion, ParsedMetrics};
pub use view_model::{
    Category, ClassifiedNode, FilteredView, Maxima, VersionCount, ViewModel, BOOTSTRAP_THRESHOLD,
};

use crate::source::{MetricsPayload, Numeric};

/// A payload converted into a view-model, plus how many records were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedPayload {
    pub metrics: Vec<NodeMetric>,
    pub view_model: ViewModel,
    pub skipped: usize,
}

impl ProcessedPayload {
    /// Validate every record and build the view-model.
    ///
    /// Server-supplied maxima are used when present and parseable.
    pub fn from_payload(payload: MetricsPayload) -> Self {
        let maxima = Maxima {
            block_count: payload.max_block_count.as_ref().and_then(Numeric::as_u64),
            cemented_count: payload.max_cemented_count.as_ref().and_then(Numeric::as_u64),
        };
        let ParsedMetrics { metrics, skipped } = parse_metrics(payload.metrics);
        let view_model = ViewModel::build_with_maxima(&metrics, maxima);

        Self {
            metrics,
            view_model,
            skipped,
        }
    }
}
