//! Application state and navigation logic.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::data::{
    points_from_samples, redact_address, ClassifiedNode, ExportDocument, FilteredView, History,
    HistoryPoint, ProcessedPayload, ViewModel,
};
use crate::source::{DataSource, MetricsPayload, NodeHistory};
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
///
/// Node detail is shown as an overlay (controlled by `App::show_detail_overlay`)
/// rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Bootstrapping and other nodes with progress bars.
    Nodes,
    /// Version filter with node counts.
    Versions,
    /// Time series for one node.
    Chart,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Nodes => View::Versions,
            View::Versions => View::Chart,
            View::Chart => View::Nodes,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            View::Nodes => View::Chart,
            View::Versions => View::Nodes,
            View::Chart => View::Versions,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Nodes => "Nodes",
            View::Versions => "Versions",
            View::Chart => "Chart",
        }
    }
}

/// Where the chart series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrigin {
    /// `/node_data` on the backend.
    Remote,
    /// Samples recorded by this session.
    Local,
}

/// The series currently shown in the chart view.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    pub node_id: String,
    pub points: Vec<HistoryPoint>,
    pub origin: SeriesOrigin,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Data source
    source: Box<dyn DataSource>,
    pub data: Option<ViewModel>,
    pub last_updated: Option<Instant>,
    pub skipped_records: usize,
    pub history: History,
    pub load_error: Option<String>,

    // Chart
    pub chart_node: Option<String>,
    remote_series: Option<(String, Vec<HistoryPoint>)>,

    // Navigation state
    pub selected_node_index: usize,
    pub selected_version_index: usize,

    // Version filter; None shows every node
    pub version_filter: Option<String>,

    // UI
    pub redact_addresses: bool,
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App with the given data source.
    pub fn new(source: Box<dyn DataSource>, redact_addresses: bool) -> Self {
        Self::with_theme(source, redact_addresses, Theme::auto_detect())
    }

    /// Create a new App with an explicit theme.
    pub fn with_theme(source: Box<dyn DataSource>, redact_addresses: bool, theme: Theme) -> Self {
        Self {
            running: true,
            current_view: View::Nodes,
            show_help: false,
            show_detail_overlay: false,
            source,
            data: None,
            last_updated: None,
            skipped_records: 0,
            history: History::new(),
            load_error: None,
            chart_node: None,
            remote_series: None,
            selected_node_index: 0,
            selected_version_index: 0,
            version_filter: None,
            redact_addresses,
            theme,
            status_message: None,
        }
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Backend link for a node, when the source has one.
    pub fn node_link(&self, node_id: &str) -> Option<String> {
        self.source.node_link(node_id)
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    /// Poll the data source for new data.
    ///
    /// Returns true if a new payload was applied. A failed fetch keeps the
    /// previous view-model and raises one status notification per distinct
    /// error.
    pub fn reload_data(&mut self) -> bool {
        if let Some(history) = self.source.poll_node_history() {
            self.apply_node_history(history);
        }

        let updated = match self.source.poll() {
            Some(payload) => {
                self.apply_payload(payload);
                true
            }
            None => false,
        };

        let error = self.source.error().map(str::to_string);
        if error != self.load_error {
            if let Some(ref e) = error {
                self.set_status_message(format!("Fetch failed: {}", e));
            }
            self.load_error = error;
        }

        updated
    }

    /// Ask the source for fresh data, then poll.
    pub fn refresh(&mut self) {
        self.source.request_refresh();
        self.reload_data();
    }

    /// Replace the view-model with one built from `payload`.
    pub fn apply_payload(&mut self, payload: MetricsPayload) {
        let processed = ProcessedPayload::from_payload(payload);
        info!(
            nodes = processed.view_model.node_count(),
            skipped = processed.skipped,
            "view model rebuilt"
        );

        self.history.record(&processed.metrics, Utc::now());
        self.skipped_records = processed.skipped;
        self.data = Some(processed.view_model);
        self.last_updated = Some(Instant::now());
        self.clamp_selection();
    }

    fn apply_node_history(&mut self, history: NodeHistory) {
        if self.chart_node.as_deref() != Some(history.node_id.as_str()) {
            return;
        }
        match history.samples {
            Ok(samples) => {
                let points = points_from_samples(&samples);
                self.remote_series = Some((history.node_id, points));
            }
            Err(e) => {
                self.set_status_message(format!("History unavailable: {}", e));
            }
        }
    }

    /// The view-model restricted to the active version filter.
    pub fn filtered_view(&self) -> Option<FilteredView<'_>> {
        self.data.as_ref().map(|d| d.filter_by_version(self.version_filter.as_deref()))
    }

    fn visible_node_count(&self) -> usize {
        self.filtered_view().map_or(0, |v| v.len())
    }

    /// The node under the cursor in the Nodes view.
    pub fn selected_node(&self) -> Option<&ClassifiedNode> {
        self.filtered_view()?.get(self.selected_node_index)
    }

    /// Version filter options: "All" (None) followed by each version label.
    pub fn version_options(&self) -> Vec<Option<String>> {
        let mut options = vec![None];
        if let Some(ref data) = self.data {
            options.extend(data.version_counts.iter().map(|v| Some(v.label.clone())));
        }
        options
    }

    fn clamp_selection(&mut self) {
        let nodes = self.visible_node_count();
        if self.selected_node_index >= nodes {
            self.selected_node_index = nodes.saturating_sub(1);
        }
        let versions = self.version_options().len();
        if self.selected_version_index >= versions {
            self.selected_version_index = versions.saturating_sub(1);
        }
    }

    /// Address shown in the UI, redacted when configured.
    pub fn display_address(&self, address: &str) -> String {
        if !self.redact_addresses {
            return address.to_string();
        }
        redact_address(address).unwrap_or_else(|_| "(malformed)".to_string())
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.set_view(self.current_view.next());
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.set_view(self.current_view.prev());
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
        if view == View::Chart && self.chart_node.is_none() {
            self.open_chart();
        }
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        match self.current_view {
            View::Nodes | View::Chart => {
                let max = self.visible_node_count().saturating_sub(1);
                self.selected_node_index = (self.selected_node_index + n).min(max);
            }
            View::Versions => {
                let max = self.version_options().len().saturating_sub(1);
                self.selected_version_index = (self.selected_version_index + n).min(max);
            }
        }
        self.follow_selection_in_chart();
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        match self.current_view {
            View::Nodes | View::Chart => {
                self.selected_node_index = self.selected_node_index.saturating_sub(n);
            }
            View::Versions => {
                self.selected_version_index = self.selected_version_index.saturating_sub(n);
            }
        }
        self.follow_selection_in_chart();
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        match self.current_view {
            View::Nodes | View::Chart => self.selected_node_index = 0,
            View::Versions => self.selected_version_index = 0,
        }
        self.follow_selection_in_chart();
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        match self.current_view {
            View::Nodes | View::Chart => {
                self.selected_node_index = self.visible_node_count().saturating_sub(1);
            }
            View::Versions => {
                self.selected_version_index = self.version_options().len().saturating_sub(1);
            }
        }
        self.follow_selection_in_chart();
    }

    fn follow_selection_in_chart(&mut self) {
        if self.current_view != View::Chart {
            return;
        }
        let selected = self.selected_node().map(|n| n.metric.node_id.clone());
        if selected.is_some() && selected != self.chart_node {
            self.open_chart();
        }
    }

    /// Handle Enter: detail overlay on Nodes, apply filter on Versions.
    pub fn activate(&mut self) {
        match self.current_view {
            View::Nodes => {
                if self.selected_node().is_some() {
                    self.show_detail_overlay = true;
                }
            }
            View::Versions => self.apply_selected_version(),
            View::Chart => {}
        }
    }

    /// Apply the version highlighted in the Versions view.
    pub fn apply_selected_version(&mut self) {
        let options = self.version_options();
        let choice = options.get(self.selected_version_index).cloned().flatten();
        self.set_version_filter(choice);
    }

    /// Cycle the version filter forward or backward through the options.
    pub fn cycle_version_filter(&mut self, forward: bool) {
        let options = self.version_options();
        let current = options.iter().position(|o| *o == self.version_filter).unwrap_or(0);
        let next = if forward {
            (current + 1) % options.len()
        } else {
            (current + options.len() - 1) % options.len()
        };
        self.selected_version_index = next;
        self.set_version_filter(options[next].clone());
    }

    /// Set or clear the version filter.
    pub fn set_version_filter(&mut self, version: Option<String>) {
        self.version_filter = version.filter(|v| !v.is_empty());
        self.selected_node_index = 0;

        let shown = self.visible_node_count();
        let message = match self.version_filter {
            Some(ref v) => format!("Filter: {} ({} nodes)", v, shown),
            None => format!("Filter cleared ({} nodes)", shown),
        };
        self.set_status_message(message);
    }

    /// Show the chart for the selected node and request its history.
    pub fn open_chart(&mut self) {
        self.current_view = View::Chart;
        let Some(node_id) = self.selected_node().map(|n| n.metric.node_id.clone()) else {
            return;
        };

        self.remote_series = None;
        if self.source.request_node_history(&node_id) {
            self.set_status_message(format!("Loading history for {}", short_id(&node_id)));
        }
        self.chart_node = Some(node_id);
    }

    /// Series for the chart view: backend history if available, else local.
    pub fn chart_series(&self) -> Option<ChartSeries> {
        let node_id = self.chart_node.as_ref()?;

        if let Some((ref id, ref points)) = self.remote_series {
            if id == node_id && !points.is_empty() {
                return Some(ChartSeries {
                    node_id: node_id.clone(),
                    points: points.clone(),
                    origin: SeriesOrigin::Remote,
                });
            }
        }

        Some(ChartSeries {
            node_id: node_id.clone(),
            points: self.history.series(node_id),
            origin: SeriesOrigin::Local,
        })
    }

    /// Navigate back: close overlay first, then return to Nodes.
    pub fn go_back(&mut self) {
        if self.show_detail_overlay {
            self.show_detail_overlay = false;
        } else if self.current_view != View::Nodes {
            self.current_view = View::Nodes;
        }
    }

    /// Close the detail overlay if open.
    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current (filtered) view to a JSON file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        let Some(ref data) = self.data else {
            anyhow::bail!("No data to export");
        };
        ExportDocument::new(data, self.version_filter.as_deref(), self.skipped_records)
            .write_to(path)
    }
}

/// Shorten a node id for display.
pub fn short_id(node_id: &str) -> &str {
    match node_id.char_indices().nth(16) {
        Some((idx, _)) => &node_id[..idx],
        None => node_id,
    }
}
