//! Data source abstraction for receiving metrics payloads.
//!
//! This module provides a trait-based abstraction for receiving node
//! telemetry from various sources (the HTTP API, JSON files, in-memory
//! channels).

mod channel;
mod file;
mod http;
mod payload;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use http::{ApiClient, FetchError, HttpSource, RequestMethod};
pub use payload::{MetricsPayload, NodeHistory, NodeSample, Numeric, RawNodeMetric, Timestamp};

use std::fmt::Debug;

/// Trait for receiving metrics payloads from various sources.
///
/// Implementations of this trait provide payloads from different
/// backends - the metrics API, file polling, or in-memory channels.
///
/// # Example
///
/// ```
/// use ledgerwatch::{DataSource, FileSource};
///
/// let mut source = FileSource::new("metrics.json");
/// if let Some(payload) = source.poll() {
///     println!("Got {} nodes", payload.metrics.len());
/// }
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for the latest payload.
    ///
    /// Returns `Some(payload)` if new data is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<MetricsPayload>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Check if the source has encountered an error.
    ///
    /// Returns the error message if the most recent fetch failed.
    fn error(&self) -> Option<&str>;

    /// Ask the source to fetch fresh data as soon as possible.
    fn request_refresh(&mut self) {}

    /// Ask the source for the recorded time series of one node.
    ///
    /// Returns false if the source cannot provide per-node history.
    fn request_node_history(&mut self, _node_id: &str) -> bool {
        false
    }

    /// Poll for a completed node history request.
    fn poll_node_history(&mut self) -> Option<NodeHistory> {
        None
    }

    /// Link to the backend's page for a node, if there is one.
    fn node_link(&self, _node_id: &str) -> Option<String> {
        None
    }
}
