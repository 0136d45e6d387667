//! Chart view rendering.
//!
//! Plots block and cemented counts over time for one node. Uses the
//! backend's `/node_data` series when it has arrived, otherwise the
//! samples recorded by this session.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::{short_id, App, SeriesOrigin};
use crate::data::HistoryPoint;
use crate::ui::format_count;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let Some(series) = app.chart_series() else {
        let hint = Paragraph::new("Select a node and press c to chart it")
            .alignment(Alignment::Center)
            .block(block.title(" Chart "));
        frame.render_widget(hint, area);
        return;
    };

    let origin = match series.origin {
        SeriesOrigin::Remote => "backend",
        SeriesOrigin::Local => "session",
    };
    let title = format!(
        " {} ({} samples, {}) ",
        short_id(&series.node_id),
        series.points.len(),
        origin
    );
    let block = block.title(title);

    if series.points.len() < 2 {
        let hint = Paragraph::new("Not enough samples yet")
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let blocks = plot_points(&series.points, |p| p.block_count);
    let cemented = plot_points(&series.points, |p| p.cemented_count);

    let x_max = blocks.last().map_or(1.0, |(x, _)| x.max(1.0));
    let (y_min, y_max) = y_bounds(&series.points);

    let datasets = vec![
        Dataset::default()
            .name("blocks")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.block_bar))
            .data(&blocks),
        Dataset::default()
            .name("cemented")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.cemented_bar))
            .data(&cemented),
    ];

    let first = &series.points[0];
    let last = &series.points[series.points.len() - 1];
    let label_style = Style::default().add_modifier(Modifier::DIM);

    let x_axis = Axis::default()
        .style(label_style)
        .bounds([0.0, x_max])
        .labels(vec![
            Span::raw(first.timestamp.format("%m-%d %H:%M").to_string()),
            Span::raw(last.timestamp.format("%m-%d %H:%M").to_string()),
        ]);

    let y_axis = Axis::default()
        .style(label_style)
        .bounds([y_min, y_max])
        .labels(vec![
            Span::raw(format_count(y_min as u64)),
            Span::raw(format_count(y_max as u64)),
        ]);

    let chart = Chart::new(datasets).block(block).x_axis(x_axis).y_axis(y_axis);
    frame.render_widget(chart, area);
}

/// Seconds since the first sample against the chosen count.
fn plot_points(points: &[HistoryPoint], value: impl Fn(&HistoryPoint) -> u64) -> Vec<(f64, f64)> {
    let Some(start) = points.first().map(|p| p.timestamp) else {
        return Vec::new();
    };
    points
        .iter()
        .map(|p| {
            let x = (p.timestamp - start).num_milliseconds() as f64 / 1000.0;
            (x, value(p) as f64)
        })
        .collect()
}

fn y_bounds(points: &[HistoryPoint]) -> (f64, f64) {
    let min = points.iter().map(|p| p.block_count.min(p.cemented_count)).min().unwrap_or(0);
    let max = points.iter().map(|p| p.block_count.max(p.cemented_count)).max().unwrap_or(0);
    if min == max {
        (min.saturating_sub(1) as f64, (max + 1) as f64)
    } else {
        (min as f64, max as f64)
    }
}
