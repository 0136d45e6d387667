//! Detail overlay rendering.
//!
//! Displays a modal overlay with everything known about the selected node.

use chrono::{TimeZone, Utc};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_uptime;
use crate::ui::format_rate;

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Render the node detail as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(node) = app.selected_node() else {
        return;
    };
    let m = &node.metric;

    let overlay_width = (area.width * 80 / 100).clamp(MIN_OVERLAY_WIDTH, 90);
    let overlay_height = 20u16.min(area.height);
    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::raw(format!(" {:<16}", label)), Span::styled(value, bold)])
    };
    let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    let live_rate = app
        .history
        .get_block_rate(&m.node_id)
        .map(|r| format!("{:.2} blocks/s", r));
    let reported = m
        .timestamp
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let mut lines = vec![
        Line::from(vec![Span::styled(format!(" {} ", m.node_id), bold)]),
        Line::from(vec![Span::styled(
            format!(" {}", node.category.label()),
            app.theme.category_style(node.category),
        )]),
        Line::from(""),
        field("Address", app.display_address(&m.address)),
        field("Version", m.version.to_string()),
        field(
            "Blocks",
            format!("{} ({:.2}%)", m.block_count, node.block_percentage),
        ),
        field(
            "Cemented",
            format!("{} ({:.2}%)", m.cemented_count, node.cemented_percentage),
        ),
        field(
            "Blocks h/d",
            format!("{} / {}", format_rate(m.hourly_blocks), format_rate(m.daily_blocks)),
        ),
        field(
            "Cemented h/d",
            format!(
                "{} / {}",
                format_rate(m.hourly_cemented),
                format_rate(m.daily_cemented)
            ),
        ),
        field("Live rate", optional(live_rate)),
        field("Peers", optional(m.peer_count.map(|p| p.to_string()))),
        field("Uptime", optional(m.uptime.map(format_uptime))),
        field("Reported", optional(reported)),
    ];

    if let Some(link) = app.node_link(&m.node_id) {
        lines.push(field("Chart", link));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![Span::styled(
        " Esc:close c:chart",
        Style::default().add_modifier(Modifier::DIM),
    )]));

    let block = Block::default()
        .title(" Node Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(Paragraph::new(lines).block(block), overlay_area);
}
