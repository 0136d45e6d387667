//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_duration;
use crate::ui::format_count;

/// Render the header bar with the network overview.
///
/// Displays: node totals per category, skipped records, active filter.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.filtered_view() else {
        let line = Line::from(vec![
            Span::styled(" LEDGERWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Loading..."),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };
    let Some(ref data) = app.data else {
        return;
    };

    let mut spans = vec![
        Span::styled(" LEDGERWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(
            view.len().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" nodes │ "),
        Span::styled(
            view.bootstrapping_count().to_string(),
            Style::default().fg(app.theme.bootstrapping),
        ),
        Span::raw(" bootstrapping "),
        Span::styled(
            view.other_count().to_string(),
            Style::default().fg(app.theme.synced),
        ),
        Span::raw(" other │ "),
        Span::raw(format!(
            "max B:{} C:{}",
            format_count(data.max_block_count),
            format_count(data.max_cemented_count)
        )),
    ];

    if app.skipped_records > 0 {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("{} skipped", app.skipped_records),
            Style::default().fg(app.theme.error),
        ));
    }

    if let Some(ref version) = view.version {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("v{}", version),
            Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![
        Line::from(" 1:Nodes "),
        Line::from(" 2:Versions "),
        Line::from(" 3:Chart "),
    ];

    let selected = match app.current_view {
        View::Nodes => 0,
        View::Versions => 1,
        View::Chart => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: source, time since last update, available controls.
/// Also displays temporary status messages and errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.current_view {
        View::Nodes => "v/V:version x:clear Enter:detail c:chart ?:help q:quit",
        View::Versions => "↑↓:select Enter:apply x:clear ?:help q:quit",
        View::Chart => "↑↓:node r:reload ?:help q:quit",
    };

    let (status, style) = match (app.last_updated, &app.load_error) {
        // Previous data stays on screen when a later fetch fails
        (Some(updated), Some(err)) => (
            format!(
                " {} | Updated {} ago | Error: {} | {}",
                app.source_description(),
                format_duration(updated.elapsed()),
                err,
                controls
            ),
            Style::default().fg(app.theme.error),
        ),
        (Some(updated), None) => (
            format!(
                " {} | Updated {} ago | {}",
                app.source_description(),
                format_duration(updated.elapsed()),
                controls
            ),
            Style::default().add_modifier(Modifier::DIM),
        ),
        (None, Some(err)) => (
            format!(" Error: {} | q:quit r:retry", err),
            Style::default().fg(app.theme.error),
        ),
        (None, None) => (
            format!(" {} | Loading... | q:quit", app.source_description()),
            Style::default().add_modifier(Modifier::DIM),
        ),
    };

    frame.render_widget(Paragraph::new(status).style(style), area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  1/2/3       Jump to view"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Detail / apply version"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        section(" Nodes"),
        Line::from("  v/V         Next/previous version"),
        Line::from("  x           Clear version filter"),
        Line::from("  c           Chart selected node"),
        Line::from(""),
        section(" General"),
        Line::from("  r           Reload data"),
        Line::from("  e           Export to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 25u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
