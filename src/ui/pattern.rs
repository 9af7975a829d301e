//! Pattern view rendering.
//!
//! Shows the spatial mask of the selected tensor at the current playback
//! frame as a heatmap, next to the list of tensors and a playback bar.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use sparsewatch_types::SpatialMask;

use super::render_sparkline;
use super::summary::format_ratio;
use crate::app::App;
use crate::ui::Theme;

/// Render the Pattern view.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let Some(ref data) = app.data else {
        return;
    };

    let chunks = Layout::horizontal([Constraint::Max(28), Constraint::Min(20)]).split(area);
    let tensors = app.visible_tensors();

    // Tensor list
    let items: Vec<ListItem> = tensors
        .iter()
        .map(|t| {
            let dims = t
                .mask_dims
                .map(|(h, w)| format!("{}x{}", h, w))
                .unwrap_or_else(|| "dense".to_string());
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<5}", t.level.symbol()), app.theme.level_style(t.level)),
                Span::raw(format!("{} ", t.name)),
                Span::styled(dims, Style::default().add_modifier(Modifier::DIM)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Tensors ")
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");
    let mut state = ListState::default();
    state.select(Some(app.selected_tensor_index.min(tensors.len().saturating_sub(1))));
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let right = Layout::vertical([Constraint::Min(4), Constraint::Length(3)]).split(chunks[1]);

    // Playback bar
    let step = app.current_step().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    let state_label = if app.playing { "▶ playing" } else { "⏸ paused" };
    let playback = Line::from(vec![
        Span::styled(format!(" step {} ", step), app.theme.header),
        Span::raw(format!(
            "│ frame {}/{} │ {} │ {}ms/frame ",
            app.frame_index + 1,
            app.frame_count(),
            state_label,
            app.frame_interval.as_millis()
        )),
    ]);

    let Some(tensor) = tensors.get(app.selected_tensor_index).copied() else {
        frame.render_widget(Paragraph::new(playback).block(bordered(&app.theme, " Playback ")), right[1]);
        return;
    };

    let ratio = data.ratio_at(&tensor.name, app.frame_index);
    let sparkline = render_sparkline(&data.sparkline(&tensor.name, app.frame_index), 16);
    let mut footer = playback;
    footer.spans.push(Span::raw("│ "));
    footer.spans.push(Span::styled(
        ratio.map(format_ratio).unwrap_or_else(|| "-".to_string()),
        ratio.map(|r| app.theme.level_style(app.thresholds.level(r))).unwrap_or_default(),
    ));
    footer.spans.push(Span::raw(format!(" {}", sparkline)));
    frame.render_widget(Paragraph::new(footer).block(bordered(&app.theme, " Playback ")), right[1]);

    // Heatmap
    let title = format!(" {} ", tensor.name);
    let block = bordered(&app.theme, &title);
    let inner = block.inner(right[0]);
    frame.render_widget(block, right[0]);

    let lines = match data.mask_at(&tensor.name, app.frame_index) {
        Some(mask) => heatmap_lines(mask, inner.width, inner.height, &app.theme),
        None => vec![Line::from(Span::styled(
            " No spatial mask for this tensor",
            Style::default().add_modifier(Modifier::DIM),
        ))],
    };
    frame.render_widget(Paragraph::new(lines), inner);
}

fn bordered<'a>(theme: &Theme, title: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(theme.border))
}

/// Cells shown for a mask drawn into a `width` x `height` character area.
///
/// Each cell is two characters wide when it fits; larger masks are
/// sampled down to the available area.
fn heatmap_grid(mask: &SpatialMask, width: u16, height: u16) -> (u32, u32, u16) {
    let cell_width = if mask.width as u64 * 2 <= width as u64 { 2 } else { 1 };
    let cols = mask.width.min((width / cell_width) as u32);
    let rows = mask.height.min(height as u32);
    (rows, cols, cell_width)
}

fn heatmap_lines(mask: &SpatialMask, width: u16, height: u16, theme: &Theme) -> Vec<Line<'static>> {
    let (rows, cols, cell_width) = heatmap_grid(mask, width, height);
    let zero = Style::default().fg(theme.mask_zero);
    let active = Style::default().fg(theme.mask_active);
    let zero_cell = "█".repeat(cell_width as usize);
    let active_cell = "·".repeat(cell_width as usize);

    (0..rows)
        .map(|r| {
            let h = r * mask.height / rows.max(1);
            let spans: Vec<Span> = (0..cols)
                .map(|c| {
                    let w = c * mask.width / cols.max(1);
                    if mask.get(h, w).unwrap_or(false) {
                        Span::styled(zero_cell.clone(), zero)
                    } else {
                        Span::styled(active_cell.clone(), active)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_masks_use_double_width_cells() {
        let mask = SpatialMask::new(4, 8);
        assert_eq!(heatmap_grid(&mask, 40, 10), (4, 8, 2));
    }

    #[test]
    fn large_masks_are_sampled_down() {
        let mask = SpatialMask::new(64, 64);
        assert_eq!(heatmap_grid(&mask, 30, 10), (10, 30, 1));
    }

    #[test]
    fn zero_cells_are_drawn_solid() {
        let mask = SpatialMask::from_cells(2, 2, vec![false, true, false, false]);
        let lines = heatmap_lines(&mask, 10, 5, &Theme::dark());
        assert_eq!(lines.len(), 2);
        let first: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(first, "··██");
        let second: String = lines[1].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(second, "····");
    }
}
