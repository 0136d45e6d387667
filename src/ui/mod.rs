//! Terminal UI rendering using ratatui.
//!
//! Each view is implemented in its own submodule with a `render` function.
//!
//! ## Submodules
//!
//! - [`nodes`]: The two node sections with block/cemented progress bars
//! - [`versions`]: Version filter list with node counts
//! - [`chart`]: Block/cemented time series for the selected node
//! - [`detail`]: Modal overlay with everything known about one node
//! - [`common`]: Shared components (header, tabs, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │                                      │
//! │ View Content                         │
//! │ (nodes/versions/chart::render)       │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlays rendered on top:
//!    - detail::render_overlay
//!    - common::render_help
//! ```

pub mod chart;
pub mod common;
pub mod detail;
pub mod nodes;
pub mod theme;
pub mod versions;

pub use theme::Theme;

/// Format large numbers with K/M suffixes
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Format an optional rate, or "-" when the backend could not compute it.
pub fn format_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}", r)).unwrap_or_else(|| "-".to_string())
}
