//! Terminal rendering.
//!
//! - [`common`]: Header, tabs, status bar and help overlay
//! - [`summary`]: Sortable table of tensor statistics
//! - [`pattern`]: Spatial mask heatmap with frame playback
//! - [`theme`]: Light and dark color themes

pub mod common;
pub mod pattern;
pub mod summary;
pub mod theme;

pub use summary::SortColumn;
pub use theme::Theme;

/// Sparkline characters (8 levels of height).
pub(crate) const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the last `width` values as a sparkline, padding with spaces.
pub(crate) fn render_sparkline(data: &[u8], width: usize) -> String {
    if data.is_empty() {
        return " ".repeat(width);
    }

    let skip = data.len().saturating_sub(width);
    data[skip..].iter().map(|&v| SPARKLINE_CHARS[v.min(7) as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_keeps_latest_values() {
        assert_eq!(render_sparkline(&[], 4), "    ");
        assert_eq!(render_sparkline(&[0, 7, 3], 8), "▁█▄");
        assert_eq!(render_sparkline(&[0, 1, 2, 3, 9], 3), "▃▄█");
    }
}
