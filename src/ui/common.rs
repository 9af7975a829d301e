//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::SparsityLevel;

/// Render the header bar with the window overview.
///
/// Displays: overall level indicator, model, step range, tensor counts by
/// level and the number of windows seen.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.data else {
        let line = Line::from(vec![
            Span::styled(" SPARSEWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Waiting for a window..."),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let mut low = 0;
    let mut elevated = 0;
    let mut high = 0;
    for tensor in &data.tensors {
        match tensor.level {
            SparsityLevel::Low => low += 1,
            SparsityLevel::Elevated => elevated += 1,
            SparsityLevel::High => high += 1,
        }
    }

    let overall = if high > 0 {
        SparsityLevel::High
    } else if elevated > 0 {
        SparsityLevel::Elevated
    } else {
        SparsityLevel::Low
    };

    let count_span = |n: usize, style: Style| {
        if n > 0 {
            Span::styled(format!("{}", n), style)
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        }
    };

    let line = Line::from(vec![
        Span::styled(" ● ", app.theme.level_style(overall)),
        Span::styled(
            format!("{} ", data.report.model.to_uppercase()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "│ steps {}-{} │ ",
            data.report.start_step, data.report.end_step
        )),
        Span::styled(format!("{}", low), Style::default().fg(app.theme.low)),
        Span::raw(" low "),
        count_span(elevated, app.theme.level_style(SparsityLevel::Elevated)),
        Span::raw(" mid "),
        count_span(high, app.theme.level_style(SparsityLevel::High)),
        Span::raw(" high │ "),
        Span::styled(
            format!("{}", data.frame_count()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" frames │ "),
        Span::raw(format!("{} windows", app.history.len())),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = vec![Line::from(" 1:Summary "), Line::from(" 2:Pattern ")];

    let selected = match app.current_view {
        View::Summary => 0,
        View::Pattern => 1,
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

    let status = if let Some(ref data) = app.data {
        let elapsed = data.last_updated.elapsed();

        let controls = if app.filter_active {
            "Type to search | Enter:apply Esc:cancel"
        } else {
            match app.current_view {
                View::Summary => "/:search s:sort ←→:frame Space:play Enter:pattern ?:help q:quit",
                View::Pattern => "↑↓:tensor ←→:frame Space:play +/-:speed Esc:back ?:help q:quit",
            }
        };

        format!(
            " {} | Updated {:.1}s ago | {}",
            app.source_description(),
            elapsed.as_secs_f64(),
            controls,
        )
    } else if let Some(ref err) = app.load_error {
        format!(" Error: {} | q:quit r:retry", err)
    } else {
        format!(" {} | Waiting... | q:quit", app.source_description())
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(title, Style::default().add_modifier(Modifier::BOLD))])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  Tab 1/2     Switch views"),
        Line::from("  ↑/↓ j/k     Select tensor"),
        Line::from("  PgUp/PgDn   Jump 10 tensors"),
        Line::from("  Home/End    First/last tensor"),
        Line::from("  Enter       Show pattern"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        section(" Playback"),
        Line::from("  ←/→ h/l     Previous/next frame"),
        Line::from("  g/G         First/last frame"),
        Line::from("  Space       Play/pause"),
        Line::from("  +/-         Faster/slower"),
        Line::from(""),
        section(" Summary"),
        Line::from("  /         Start filter/search"),
        Line::from("  c         Clear filter"),
        Line::from("  s         Cycle sort column"),
        Line::from("  S         Toggle sort direction"),
        Line::from(""),
        section(" General"),
        Line::from("  r         Reload data"),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
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

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 30u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
