use std::time::Instant;

use ansi_to_tui::IntoText;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph,
        Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};

use crate::app::{AppState, InputMode, View};
use crate::model::LogEntry;

const LEVEL_BAR_HEIGHT: u16 = 8;
const LEGEND_HEIGHT: u16 = 3;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, state: &mut AppState, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // View body
            Constraint::Length(1), // Page bar / chart summary
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Prompt or message line
        ])
        .split(frame.area());

    draw_header(frame, state, chunks[0]);
    match state.view {
        View::Tail => {
            draw_log_view(frame, state, chunks[1], now);
            draw_page_bar(frame, state, chunks[2]);
        }
        View::Chart => {
            draw_chart_view(frame, state, chunks[1]);
            draw_chart_summary(frame, state, chunks[2]);
        }
    }
    draw_status_bar(frame, state, chunks[3]);
    draw_message_line(frame, state, chunks[4]);

    if state.mode == InputMode::ConfirmClear {
        draw_confirm_clear(frame, state);
    }
    if state.show_help {
        draw_help_overlay(frame, state);
    }
}

/// Header: store name, refresh countdown, last update
fn draw_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let session = &state.session;

    let refresh = if session.auto_refresh_enabled() {
        match session.countdown() {
            Some(secs) => format!("auto {}s", secs),
            None => "auto".to_string(),
        }
    } else {
        "paused".to_string()
    };
    let updated = session
        .last_updated()
        .map(|t| format!("updated {}", t.format("%H:%M:%S")))
        .unwrap_or_else(|| "never updated".to_string());

    let mut spans = vec![
        Span::styled(
            " tailview ",
            Style::default().fg(theme.header_title).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(state.source_name.as_str(), Style::default().fg(theme.header_source)),
        Span::raw(format!(" | {} | {}", refresh, updated)),
    ];
    if session.is_loading() || state.chart.is_loading() {
        spans.push(Span::styled(
            " | loading...",
            Style::default().fg(theme.warning_message),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme.header_bg));
    frame.render_widget(header, area);
}

/// Build the display line for one entry
fn entry_line<'a>(state: &AppState, entry: &'a LogEntry) -> Line<'a> {
    let theme = &state.theme;
    let mut spans = Vec::with_capacity(8);

    if state.session.is_new(entry) {
        spans.push(Span::styled("● ", Style::default().fg(theme.new_entry)));
    } else {
        spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(
        format!("{} ", entry.timestamp),
        Style::default().fg(theme.timestamp),
    ));
    spans.push(Span::styled(
        format!("{:<10}", format!("[{}]", entry.level)),
        Style::default()
            .fg(theme.level_color(entry.level))
            .add_modifier(Modifier::BOLD),
    ));
    if let Some(category) = &entry.category {
        spans.push(Span::styled(
            format!("{} ", category),
            Style::default().fg(theme.category),
        ));
    }
    if let Some(function) = &entry.function {
        spans.push(Span::styled(
            format!("{}() ", function),
            Style::default().fg(theme.function),
        ));
    }

    if entry.message.contains('\x1b') {
        // Message carries its own ANSI styling
        match entry.message.as_bytes().into_text() {
            Ok(text) => {
                for line in text.lines {
                    spans.extend(line.spans);
                }
            }
            Err(_) => spans.push(Span::raw(entry.message.as_str())),
        }
    } else if let Some(highlight) = &state.search_highlight {
        let matched = Style::default()
            .fg(theme.highlight_match_fg)
            .bg(theme.highlight_match_bg);
        for (segment, is_match) in highlight.split(&entry.message) {
            if is_match {
                spans.push(Span::styled(segment, matched));
            } else {
                spans.push(Span::raw(segment));
            }
        }
    } else {
        spans.push(Span::raw(entry.message.as_str()));
    }

    Line::from(spans)
}

/// Draw the log pane for the current page
fn draw_log_view(frame: &mut Frame, state: &mut AppState, area: Rect, now: Instant) {
    let snapshot = state.session.snapshot();
    let mut title = format!(" Logs ({} of {}) ", snapshot.len(), snapshot.source.total_lines);
    if !snapshot.source.file_path.is_empty() {
        title.push_str(&format!("{} ", snapshot.source.file_path));
    }
    if !snapshot.source.last_modified.is_empty() {
        title.push_str(&format!("· modified {} ", snapshot.source.last_modified));
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.theme.border_focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    if height == 0 {
        return;
    }
    state.sync_viewport(height);

    let state = &*state;
    let entries = state.session.visible_entries();
    if entries.is_empty() {
        let (msg, color) = if state.session.is_loading() {
            ("Loading logs...", state.theme.empty_state)
        } else if state.session.error().is_some() {
            ("Could not load logs", state.theme.error_banner)
        } else {
            ("No log entries match the current filters", state.theme.empty_state)
        };
        frame.render_widget(Paragraph::new(msg).style(Style::default().fg(color)), inner);
        return;
    }

    let lines: Vec<Line<'_>> = entries
        .iter()
        .skip(state.scroll)
        .take(height)
        .map(|entry| entry_line(state, entry))
        .collect();

    let mut style = Style::default();
    if state.session.pagination().is_transitioning(now) {
        style = style.add_modifier(Modifier::DIM);
    }
    frame.render_widget(Paragraph::new(lines).style(style), inner);

    if entries.len() > height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state =
            ScrollbarState::new(entries.len().saturating_sub(height)).position(state.scroll);
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
}

/// Page position below the log pane
fn draw_page_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let pagination = state.session.pagination();
    let range = pagination.visible_range();
    let rows = if range.is_empty() {
        "no entries".to_string()
    } else {
        format!("entries {}-{} of {}", range.start + 1, range.end, pagination.len())
    };
    let mut spans = vec![Span::raw(format!(
        " Page {}/{} | {} | {} per page",
        pagination.current_page(),
        pagination.total_pages(),
        rows,
        pagination.page_size()
    ))];
    let new_count = state.session.highlight_count();
    if new_count > 0 {
        spans.push(Span::styled(
            format!(" | {} new", new_count),
            Style::default().fg(state.theme.new_entry),
        ));
    }
    spans.push(Span::styled(
        "  ←/→ page  Home/End  : go to",
        Style::default().fg(state.theme.status_help),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Summary of the active filters for the status bar
fn filter_summary(state: &AppState) -> String {
    let filters = state.session.filters();
    let mut parts = Vec::new();

    let levels: Vec<&str> = filters.levels.iter().map(|l| l.as_str()).collect();
    parts.push(if levels.is_empty() {
        "levels: all".to_string()
    } else {
        format!("levels: {}", levels.join(","))
    });
    if let Some(category) = &filters.category {
        parts.push(format!("cat: {}", category));
    }
    if let Some(function) = &filters.function {
        parts.push(format!("fn: {}", function));
    }
    if let Some(highlight) = &state.search_highlight {
        parts.push(format!("search: {}", highlight.term));
    }
    if let Some(range) = filters.date_range_label() {
        parts.push(format!("dates: {}", range));
    }
    parts.push(format!("lines: {}", filters.lines));
    if filters.cleanup.distinct {
        parts.push("distinct".to_string());
    }
    parts.join(" | ")
}

/// Draw the status bar
fn draw_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let mode_str = match (state.mode, state.view) {
        (InputMode::Prompt(_), _) => "PROMPT",
        (InputMode::ConfirmClear, _) => "CONFIRM",
        (InputMode::Normal, View::Tail) => "TAIL",
        (InputMode::Normal, View::Chart) => "CHART",
    };

    let help_text = match state.mode {
        InputMode::Prompt(_) => " Enter:apply  Esc:cancel ",
        InputMode::ConfirmClear => " y:confirm  any key:cancel ",
        InputMode::Normal => " ?:help  Tab:view  q:quit ",
    };

    let summary = match state.view {
        View::Tail => filter_summary(state),
        View::Chart => format!("period: {}", state.chart.period()),
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default().bg(theme.status_mode_bg).fg(theme.status_mode_fg),
        ),
        Span::styled(format!(" {} ", summary), Style::default().fg(theme.filter_active)),
        Span::styled(help_text, Style::default().fg(theme.status_help)),
    ]);

    frame.render_widget(Paragraph::new(status).style(Style::default().bg(theme.status_bg)), area);
}

/// Prompt input, or the most important pending message
fn draw_message_line(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;

    if let InputMode::Prompt(kind) = state.mode {
        let label = format!("{}: ", kind.label());
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(label.len() as u16), Constraint::Min(1)])
            .split(area);
        frame.render_widget(
            Paragraph::new(label).style(Style::default().fg(theme.warning_message)),
            chunks[0],
        );
        frame.render_widget(&state.prompt, chunks[1]);
        return;
    }

    let error = state.alert.as_deref().or(match state.view {
        View::Tail => state.session.error(),
        View::Chart => state.chart.error(),
    });
    let line = if let Some(error) = error {
        Line::from(vec![
            Span::styled(
                format!(" {} ", error),
                Style::default().fg(theme.error_banner).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" Esc:dismiss  r:retry", Style::default().fg(theme.status_help)),
        ])
    } else if let Some(msg) = &state.status_message {
        Line::from(Span::styled(msg.as_str(), Style::default().fg(theme.warning_message)))
    } else {
        return;
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the chart view: level totals, per-category series, legend
fn draw_chart_view(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let chart = &state.chart;

    let block = Block::default()
        .title(format!(" Log volume ({}) ", chart.period()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if chart.data().is_none() || chart.is_empty() {
        let msg = if chart.is_loading() {
            "Loading chart..."
        } else if chart.error().is_some() {
            "Could not load chart data"
        } else {
            "No data for this period"
        };
        frame.render_widget(
            Paragraph::new(msg).style(Style::default().fg(theme.empty_state)),
            inner,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(LEVEL_BAR_HEIGHT),
            Constraint::Min(5),
            Constraint::Length(LEGEND_HEIGHT),
        ])
        .split(inner);

    draw_level_bars(frame, state, chunks[0]);
    draw_series(frame, state, chunks[1]);
    draw_legend(frame, state, chunks[2]);
}

fn draw_level_bars(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let bars: Vec<Bar> = state
        .chart
        .level_bars()
        .into_iter()
        .map(|(level, count)| {
            Bar::default()
                .value(count)
                .label(Line::from(level.as_str()))
                .style(Style::default().fg(theme.level_color(level)))
        })
        .collect();

    let bar_chart = BarChart::default()
        .block(
            Block::default()
                .title(" By level ")
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.border_unfocused)),
        )
        .bar_width(9)
        .bar_gap(2)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(bar_chart, area);
}

fn draw_series(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let chart = &state.chart;
    let Some(data) = chart.data() else {
        return;
    };

    // Colors follow the legend position so hiding a series keeps the rest stable
    let series: Vec<(String, Vec<(f64, f64)>, usize)> = chart
        .categories()
        .into_iter()
        .enumerate()
        .filter(|(_, c)| chart.is_category_visible(c))
        .map(|(i, c)| (c.to_string(), chart.series_points(c), i))
        .collect();

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(name, points, index)| {
            Dataset::default()
                .name(name.as_str())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme.series_color(*index)))
                .data(points)
        })
        .collect();

    let buckets = &data.time_series;
    let x_max = buckets.len().saturating_sub(1).max(1) as f64;
    let x_labels: Vec<String> = match (buckets.first(), buckets.last()) {
        (Some(first), Some(last)) => vec![first.bucket.clone(), last.bucket.clone()],
        _ => Vec::new(),
    };
    let y_max = chart.y_max();
    let y_labels = vec!["0".to_string(), (y_max / 2).to_string(), y_max.to_string()];

    let axis_style = Style::default().fg(theme.border_unfocused);
    let widget = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, y_max as f64])
                .labels(y_labels),
        )
        .legend_position(None);
    frame.render_widget(widget, area);
}

/// Category legend; hidden series are struck through
fn draw_legend(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let chart = &state.chart;
    let selected = chart.selected_category();
    let counts = chart.data().map(|d| d.by_category.as_slice()).unwrap_or(&[]);

    let mut spans = Vec::new();
    for (i, entry) in counts.iter().enumerate() {
        let name = entry.category.as_str();
        let mut style = Style::default().fg(theme.series_color(i));
        if !chart.is_category_visible(name) {
            style = style.fg(theme.empty_state).add_modifier(Modifier::CROSSED_OUT);
        }
        if selected == Some(name) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(format!("■ {} ({})", name, entry.count), style));
        spans.push(Span::raw("  "));
    }

    let legend = Paragraph::new(Line::from(spans))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(theme.border_unfocused))
                .title(" ←/→ select  Space toggle "),
        );
    frame.render_widget(legend, area);
}

/// Included levels and totals below the chart
fn draw_chart_summary(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = &state.theme;
    let chart = &state.chart;

    let mut spans = vec![Span::raw(" Levels: ")];
    for level in crate::model::LogLevel::ALL {
        let mut style = Style::default().fg(theme.level_color(level));
        if !chart.levels().is_included(level) {
            style = style.fg(theme.empty_state).add_modifier(Modifier::CROSSED_OUT);
        }
        spans.push(Span::styled(level.as_str(), style));
        spans.push(Span::raw(" "));
    }
    if let Some(data) = chart.data() {
        spans.push(Span::raw(format!("| total {}", data.total())));
    }
    spans.push(Span::styled(
        "  1-5 levels  p period",
        Style::default().fg(theme.status_help),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Centered rectangle of at most `width` x `height`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Destructive-action confirmation
fn draw_confirm_clear(frame: &mut Frame, state: &AppState) {
    let theme = &state.theme;
    let area = centered(frame.area(), 48, 7);
    frame.render_widget(Clear, area);

    let text = vec![
        Line::from(Span::styled(
            "Clear all logs?",
            Style::default().fg(theme.error_banner).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("This truncates {}.", state.source_name)),
        Line::from("Press y to confirm, any other key to cancel."),
    ];
    let block = Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.error_banner))
        .style(Style::default().bg(theme.help_bg));
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
}

/// Draw the help overlay
fn draw_help_overlay(frame: &mut Frame, state: &AppState) {
    let theme = &state.theme;
    let area = centered(frame.area(), 56, 34);
    frame.render_widget(Clear, area);

    let heading = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("Keyboard Shortcuts", heading)),
        Line::from(""),
        Line::from("Tail view:"),
        Line::from("  r            Refresh now"),
        Line::from("  a            Toggle auto-refresh"),
        Line::from("  ←/→, h/l     Previous/next page"),
        Line::from("  Home/End     First/last page"),
        Line::from("  :            Go to page"),
        Line::from("  j/k, ↑/↓     Scroll within the page"),
        Line::from("  g/G          Top/bottom of the page"),
        Line::from(""),
        Line::from("Filters:"),
        Line::from("  1-5          Toggle DEBUG..CRITICAL"),
        Line::from("  c/C, f/F     Cycle category/function"),
        Line::from("  /            Search"),
        Line::from("  D            Date range"),
        Line::from("  L            Line cap"),
        Line::from("  u            Toggle distinct"),
        Line::from("  0            Reset filters"),
        Line::from(""),
        Line::from("Actions:"),
        Line::from("  e            Export to file"),
        Line::from("  y            Copy page to clipboard"),
        Line::from("  X            Clear all logs"),
        Line::from(""),
        Line::from("Chart view:"),
        Line::from("  1-5          Include/exclude level"),
        Line::from("  p            Cycle period"),
        Line::from("  ←/→, Space   Select/toggle category"),
        Line::from(""),
        Line::from("  Tab          Switch view"),
        Line::from("  Esc          Dismiss error"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q            Quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.help_border))
        .style(Style::default().bg(theme.help_bg));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}
