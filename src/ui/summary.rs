//! Summary view rendering.
//!
//! Displays a table of all monitored tensors with the ratio at the current
//! frame, window statistics, a sparkline of the window so far and the
//! sparsity level.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use super::render_sparkline;
use crate::app::App;
use crate::data::TensorRow;

/// Column to sort by in the Summary view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Sort by tensor name alphabetically.
    #[default]
    Name,
    /// Sort by window mean ratio.
    Mean,
    /// Sort by slope of the ratio over steps.
    Slope,
    /// Sort by mask churn.
    Churn,
    /// Sort by sparsity level.
    Level,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Name => SortColumn::Mean,
            SortColumn::Mean => SortColumn::Slope,
            SortColumn::Slope => SortColumn::Churn,
            SortColumn::Churn => SortColumn::Level,
            SortColumn::Level => SortColumn::Name,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Mean => "mean",
            SortColumn::Slope => "slope",
            SortColumn::Churn => "churn",
            SortColumn::Level => "level",
        }
    }
}

/// Render the Summary view showing all tensors in a sortable table.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let Some(ref data) = app.data else {
        return;
    };

    let tensors = app.visible_tensors();

    let header = Row::new(vec![
        Cell::from(format_header("Tensor", SortColumn::Name, app)),
        Cell::from("Now"),
        Cell::from(format_header("Mean", SortColumn::Mean, app)),
        Cell::from("Min"),
        Cell::from("Max"),
        Cell::from(format_header("Slope", SortColumn::Slope, app)),
        Cell::from(format_header("Churn", SortColumn::Churn, app)),
        Cell::from("Trend"),
        Cell::from("Drift"),
        Cell::from(format_header("Level", SortColumn::Level, app)),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = tensors
        .iter()
        .map(|t| {
            let now = data.ratio_at(&t.name, app.frame_index);
            let now_style = now
                .map(|r| app.theme.level_style(app.thresholds.level(r)))
                .unwrap_or_default();
            let sparkline = render_sparkline(&data.sparkline(&t.name, app.frame_index), 8);

            // Change of the window mean against the previous window
            let drift = app
                .history
                .get_drift(&t.name)
                .map(|d| format!("{:+.3}", d))
                .unwrap_or_else(|| "-".to_string());

            let churn = t
                .trend
                .mask_churn
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "-".to_string());

            Row::new(vec![
                Cell::from(t.name.clone()),
                Cell::from(now.map(format_ratio).unwrap_or_else(|| "-".to_string()))
                    .style(now_style),
                Cell::from(format_ratio(t.trend.mean)),
                Cell::from(format_ratio(t.trend.min)),
                Cell::from(format_ratio(t.trend.max)),
                Cell::from(format!("{:+.2e}", t.trend.slope)),
                Cell::from(churn),
                Cell::from(sparkline),
                Cell::from(drift),
                Cell::from(t.level.symbol()).style(app.theme.level_style(t.level)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(3), // Tensor
        Constraint::Fill(1), // Now
        Constraint::Fill(1), // Mean
        Constraint::Fill(1), // Min
        Constraint::Fill(1), // Max
        Constraint::Fill(1), // Slope
        Constraint::Fill(1), // Churn
        Constraint::Min(8),  // Trend
        Constraint::Fill(1), // Drift
        Constraint::Min(5),  // Level
    ];

    let selected_visual_index = app.selected_tensor_index.min(tensors.len().saturating_sub(1));

    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !tensors.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, tensors.len())
    } else {
        String::new()
    };

    let title = format!(
        " Tensors ({}/{}) [s:sort {}{}]{}{} ",
        tensors.len(),
        data.tensors.len(),
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

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
    state.select(Some(selected_visual_index));

    frame.render_stateful_widget(table, area, &mut state);
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::styled(format!("{}{}", name, arrow), Style::default().add_modifier(Modifier::UNDERLINED))
    } else {
        Span::raw(name.to_string())
    }
}

/// Sort tensors by the given column and direction.
pub fn sort_tensors_by(tensors: &mut [&TensorRow], column: SortColumn, ascending: bool) {
    tensors.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Name => a.name.cmp(&b.name),
            SortColumn::Mean => a.trend.mean.total_cmp(&b.trend.mean),
            SortColumn::Slope => a.trend.slope.total_cmp(&b.trend.slope),
            SortColumn::Churn => {
                let a_churn = a.trend.mask_churn.unwrap_or(-1.0);
                let b_churn = b.trend.mask_churn.unwrap_or(-1.0);
                a_churn.total_cmp(&b_churn)
            }
            SortColumn::Level => a.level.cmp(&b.level),
        };

        let primary = if ascending {
            primary
        } else {
            primary.reverse()
        };

        // Secondary sort by name for stability when primary values are equal
        if primary == Ordering::Equal {
            a.name.cmp(&b.name)
        } else {
            primary
        }
    });
}

/// Format a ratio with three decimals.
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.3}", ratio)
}
