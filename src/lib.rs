//! # ledgerwatch
//!
//! A terminal dashboard and library for watching the sync progress of a
//! ledger network's nodes.
//!
//! The dashboard polls a metrics backend for per-node telemetry (block and
//! cemented counts, version, rates), validates every record, and builds a
//! view-model: nodes are split into "bootstrapping" and "other" sections by
//! how far their cemented count trails the network, sorted by progress, and
//! can be filtered by software version.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐ │
//! │  │  app    │───▶│   data   │───▶│   ui    │───▶│ Terminal│ │
//! │  │ (state) │    │(view model)   │(rendering)   │         │ │
//! │  └────┬────┘    └──────────┘    └─────────┘    └─────────┘ │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  ┌─────────┐                                                │
//! │  │ source  │◀── HttpSource | FileSource | ChannelSource    │
//! │  │ (input) │                                                │
//! │  └─────────┘                                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: Application state, view navigation and version filtering
//! - **[`source`]**: Data source abstraction ([`DataSource`] trait) with implementations
//!   for the metrics API, file polling and channel-based input
//! - **[`data`]**: Validation, classification and sorting into a [`ViewModel`],
//!   plus local history for charts
//! - **[`settings`]**: Layered configuration ([`Settings`])
//! - **[`ui`]**: Terminal rendering using ratatui
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a metrics backend
//! ledgerwatch --url https://dashboard.example.org --refresh 30s
//!
//! # Replay a saved payload
//! ledgerwatch --file metrics.json
//!
//! # Export the view model once and exit
//! ledgerwatch --url http://localhost:5000 --export nodes.json --version 25.0.0
//! ```
//!
//! ### Building a view model
//!
//! ```
//! use ledgerwatch::{NodeMetric, NodeVersion, ViewModel};
//!
//! let metrics = vec![
//!     NodeMetric::new("a", "10.0.0.1", 100, 100, NodeVersion::new(25, 0, 0, 0)),
//!     NodeMetric::new("b", "10.0.0.2", 100, 40, NodeVersion::new(25, 0, 0, 0)),
//! ];
//! let view = ViewModel::build(&metrics);
//! assert_eq!(view.bootstrapping.len(), 1);
//! assert_eq!(view.other.len(), 1);
//! ```
//!
//! ### As a library with channel source
//!
//! ```
//! use ledgerwatch::{App, ChannelSource, MetricsPayload};
//! use ledgerwatch::ui::Theme;
//!
//! let (tx, source) = ChannelSource::create("embedded");
//! let mut app = App::with_theme(Box::new(source), true, Theme::dark());
//!
//! tx.send(MetricsPayload::default()).unwrap();
//! assert!(app.reload_data());
//! ```

pub mod app;
pub mod data;
pub mod events;
pub mod settings;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use data::{
    Category, ClassifiedNode, FilteredView, History, MetricError, NodeMetric, NodeVersion,
    ProcessedPayload, VersionCount, ViewModel,
};
pub use settings::Settings;
pub use source::{
    ApiClient, ChannelSource, DataSource, FetchError, FileSource, HttpSource, MetricsPayload,
    RawNodeMetric, RequestMethod,
};
