//! Versions view rendering.
//!
//! Lists every reported version with its node count. The first row ("All")
//! clears the filter.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        return;
    };

    let header = Row::new(vec![Cell::from("Version"), Cell::from("Nodes"), Cell::from("")])
        .height(1)
        .style(app.theme.header);

    let all = Row::new(vec![
        Cell::from("All"),
        Cell::from(data.node_count().to_string()),
        Cell::from(active_marker(app.version_filter.is_none())),
    ]);

    let rows: Vec<Row> = std::iter::once(all)
        .chain(data.version_counts.iter().map(|v| {
            let active = app.version_filter.as_deref() == Some(v.label.as_str());
            let row = Row::new(vec![
                Cell::from(v.label.clone()),
                Cell::from(v.count.to_string()),
                Cell::from(active_marker(active)),
            ]);
            if active {
                row.style(Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD))
            } else {
                row
            }
        }))
        .collect();

    let widths = [Constraint::Fill(2), Constraint::Fill(1), Constraint::Length(8)];
    let title = format!(" Versions ({}) [Enter:apply x:clear] ", data.version_counts.len());

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(app.selected_version_index.min(data.version_counts.len())));

    frame.render_stateful_widget(table, area, &mut state);
}

fn active_marker(active: bool) -> &'static str {
    if active {
        "● active"
    } else {
        ""
    }
}
