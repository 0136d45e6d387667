//! Nodes view rendering.
//!
//! Displays the bootstrapping and other sections, each a table with
//! block and cemented progress bars against the network maxima.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{short_id, App};
use crate::data::{Category, ClassifiedNode};
use crate::ui::{format_count, format_rate};

/// Width of the text progress bars, in cells.
const BAR_WIDTH: usize = 12;

/// Render the Nodes view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.filtered_view() else {
        let message = match app.load_error {
            Some(ref err) => format!("Failed to load metrics: {}", err),
            None => "Waiting for metrics...".to_string(),
        };
        frame.render_widget(Paragraph::new(message).block(bordered(app, " Nodes ")), area);
        return;
    };

    // Sections share the height in proportion to their size
    let weight = |n: usize| n.clamp(1, u16::MAX as usize) as u16;
    let chunks = Layout::vertical([
        Constraint::Fill(weight(view.bootstrapping_count())),
        Constraint::Fill(weight(view.other_count())),
    ])
    .split(area);

    let boot_len = view.bootstrapping_count();
    let selected = app.selected_node_index.min(view.len().saturating_sub(1));
    let (boot_selected, other_selected) = if view.is_empty() {
        (None, None)
    } else if selected < boot_len {
        (Some(selected), None)
    } else {
        (None, Some(selected - boot_len))
    };

    render_section(frame, app, chunks[0], Category::Bootstrapping, &view.bootstrapping, boot_selected);
    render_section(frame, app, chunks[1], Category::Other, &view.other, other_selected);
}

fn render_section(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    category: Category,
    nodes: &[&ClassifiedNode],
    selected: Option<usize>,
) {
    let header = Row::new(vec![
        Cell::from("Node"),
        Cell::from("Address"),
        Cell::from("Version"),
        Cell::from("Blocks"),
        Cell::from("Cemented"),
        Cell::from("B/h"),
        Cell::from("C/h"),
        Cell::from("Peers"),
    ])
    .height(1)
    .style(app.theme.header);

    let category_style = app.theme.category_style(category);
    let rows: Vec<Row> = nodes
        .iter()
        .map(|node| {
            let m = &node.metric;
            Row::new(vec![
                Cell::from(short_id(&m.node_id).to_string()).style(category_style),
                Cell::from(app.display_address(&m.address)),
                Cell::from(node.version_label.clone()),
                Cell::from(bar_line(
                    node.block_percentage,
                    m.block_count,
                    Style::default().fg(app.theme.block_bar),
                )),
                Cell::from(bar_line(
                    node.cemented_percentage,
                    m.cemented_count,
                    Style::default().fg(app.theme.cemented_bar),
                )),
                Cell::from(format_rate(m.hourly_blocks)),
                Cell::from(format_rate(m.hourly_cemented)),
                Cell::from(m.peer_count.map(|p| p.to_string()).unwrap_or_else(|| "-".into())),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(17),
        Constraint::Fill(1),
        Constraint::Length(12),
        Constraint::Min(30),
        Constraint::Min(30),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(6),
    ];

    let position_info = match selected {
        Some(i) => format!(" [{}/{}]", i + 1, nodes.len()),
        None => String::new(),
    };
    let title = format!(" {} ({}){} ", category.label(), nodes.len(), position_info);

    let table = Table::new(rows, widths)
        .header(header)
        .block(bordered(app, &title))
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(selected);

    frame.render_stateful_widget(table, area, &mut state);
}

fn bordered<'a>(app: &App, title: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border))
}

fn bar_line(percentage: f64, count: u64, style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(progress_bar(percentage, BAR_WIDTH), style),
        Span::raw(format!(" {:>6.2}% {}", percentage, format_count(count))),
    ])
}

/// Render a percentage as a fixed-width bar of full and empty cells.
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
