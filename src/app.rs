//! Application state, navigation and playback logic.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::data::{History, SparsityLevel, TensorRow, Thresholds, WindowData};
use crate::source::ReportSource;
use crate::ui::summary::SortColumn;
use crate::ui::Theme;

/// Slowest and fastest playback rates.
const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(2);
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Table of all tensors with window statistics.
    Summary,
    /// Spatial mask of the selected tensor at the current frame.
    Pattern,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Summary => View::Pattern,
            View::Pattern => View::Summary,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        // Two views, so previous and next coincide.
        self.next()
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Summary => "Summary",
            View::Pattern => "Pattern",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    // Data source
    source: Box<dyn ReportSource>,
    pub data: Option<WindowData>,
    pub history: History,
    pub load_error: Option<String>,
    pub thresholds: Thresholds,

    // Navigation state (visual index into the sorted, filtered tensor list)
    pub selected_tensor_index: usize,

    // Playback over the frames of the current window
    pub frame_index: usize,
    pub playing: bool,
    pub frame_interval: Duration,
    last_advance: Instant,

    // Sorting (Summary view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App with the given report source and thresholds.
    pub fn new(source: Box<dyn ReportSource>, thresholds: Thresholds) -> Self {
        Self::with_theme(source, thresholds, Theme::auto_detect())
    }

    /// Create a new App with an explicit theme.
    pub fn with_theme(source: Box<dyn ReportSource>, thresholds: Thresholds, theme: Theme) -> Self {
        Self {
            running: true,
            current_view: View::Summary,
            show_help: false,
            source,
            data: None,
            history: History::new(),
            load_error: None,
            thresholds,
            selected_tensor_index: 0,
            frame_index: 0,
            playing: false,
            frame_interval: Duration::from_millis(500),
            last_advance: Instant::now(),
            sort_column: SortColumn::default(),
            sort_ascending: true,
            filter_text: String::new(),
            filter_active: false,
            theme,
            status_message: None,
        }
    }

    /// Returns a description of the current report source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Drain the report source.
    ///
    /// Every window received is recorded in the history; the newest one
    /// becomes the displayed window and playback jumps to its last frame.
    /// Returns Ok(true) if at least one window was received.
    pub fn reload_data(&mut self) -> Result<bool> {
        let mut received = false;
        while let Some(report) = self.source.poll() {
            let data = WindowData::from_report(report, &self.thresholds);
            self.history.record(&data);
            self.data = Some(data);
            received = true;
        }

        if received {
            self.load_error = None;
            self.frame_index = self.frame_count().saturating_sub(1);
            self.playing = false;

            // Clamp selection index
            let count = self.visible_tensors().len();
            if self.selected_tensor_index >= count {
                self.selected_tensor_index = count.saturating_sub(1);
            }
        } else if let Some(err) = self.source.error() {
            self.load_error = Some(err.to_string());
        }

        Ok(received)
    }

    /// Number of frames in the displayed window.
    pub fn frame_count(&self) -> usize {
        self.data.as_ref().map(|d| d.frame_count()).unwrap_or(0)
    }

    /// Step of the frame currently shown.
    pub fn current_step(&self) -> Option<u64> {
        self.data.as_ref()?.step_at(self.frame_index)
    }

    /// Advance playback if it is running and the frame interval elapsed.
    ///
    /// Playback stops on the last frame. Returns true if the frame changed.
    pub fn tick(&mut self) -> bool {
        if !self.playing || self.last_advance.elapsed() < self.frame_interval {
            return false;
        }
        self.last_advance = Instant::now();

        if self.frame_index + 1 < self.frame_count() {
            self.frame_index += 1;
            true
        } else {
            self.playing = false;
            false
        }
    }

    /// Start or pause playback. Starting from the last frame rewinds.
    pub fn toggle_playback(&mut self) {
        if self.playing {
            self.playing = false;
            return;
        }
        if self.frame_count() < 2 {
            return;
        }
        if self.frame_index + 1 >= self.frame_count() {
            self.frame_index = 0;
        }
        self.playing = true;
        self.last_advance = Instant::now();
    }

    /// Show the next frame.
    pub fn next_frame(&mut self) {
        let max = self.frame_count().saturating_sub(1);
        self.frame_index = (self.frame_index + 1).min(max);
    }

    /// Show the previous frame.
    pub fn prev_frame(&mut self) {
        self.frame_index = self.frame_index.saturating_sub(1);
    }

    /// Jump to the first frame of the window.
    pub fn first_frame(&mut self) {
        self.frame_index = 0;
    }

    /// Jump to the last frame of the window.
    pub fn last_frame(&mut self) {
        self.frame_index = self.frame_count().saturating_sub(1);
    }

    /// Halve the frame interval.
    pub fn faster(&mut self) {
        self.frame_interval = (self.frame_interval / 2).max(MIN_FRAME_INTERVAL);
    }

    /// Double the frame interval.
    pub fn slower(&mut self) {
        self.frame_interval = (self.frame_interval * 2).min(MAX_FRAME_INTERVAL);
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Tensors after filtering and sorting, in display order.
    pub fn visible_tensors(&self) -> Vec<&TensorRow> {
        let Some(ref data) = self.data else {
            return Vec::new();
        };
        let mut tensors: Vec<&TensorRow> =
            data.tensors.iter().filter(|t| self.matches_filter(&t.name)).collect();
        crate::ui::summary::sort_tensors_by(
            &mut tensors,
            self.sort_column,
            self.sort_ascending,
        );
        tensors
    }

    /// The tensor under the cursor.
    pub fn selected_tensor(&self) -> Option<&TensorRow> {
        self.visible_tensors().get(self.selected_tensor_index).copied()
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.visible_tensors().len().saturating_sub(1);
        self.selected_tensor_index = (self.selected_tensor_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_tensor_index = self.selected_tensor_index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        self.selected_tensor_index = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.selected_tensor_index = self.visible_tensors().len().saturating_sub(1);
    }

    /// Open the pattern view for the selected tensor.
    pub fn enter_pattern(&mut self) {
        if self.selected_tensor().is_some() {
            self.current_view = View::Pattern;
        }
    }

    /// Navigate back to the summary.
    pub fn go_back(&mut self) {
        self.current_view = View::Summary;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column.
    pub fn cycle_sort(&mut self) {
        self.sort_column = self.sort_column.next();
    }

    /// Toggle sort direction between ascending and descending.
    pub fn toggle_sort_direction(&mut self) {
        self.sort_ascending = !self.sort_ascending;
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.selected_tensor_index = 0;
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    /// Check if a tensor name matches the current filter.
    pub fn matches_filter(&self, name: &str) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        name.to_lowercase().contains(&self.filter_text.to_lowercase())
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the displayed window to a file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        let Some(ref data) = self.data else {
            anyhow::bail!("No data to export");
        };
        write_export(data, path)
    }
}

/// Build the JSON export of a processed window.
pub fn export_value(data: &WindowData) -> serde_json::Value {
    let count = |level: SparsityLevel| data.tensors.iter().filter(|t| t.level == level).count();

    let tensors: Vec<serde_json::Value> = data
        .tensors
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "samples": t.trend.samples,
                "mean": t.trend.mean,
                "min": t.trend.min,
                "max": t.trend.max,
                "first": t.trend.first,
                "last": t.trend.last,
                "slope": t.trend.slope,
                "mask_churn": t.trend.mask_churn,
                "level": format!("{:?}", t.level),
                "series": data.report.series(&t.name),
            })
        })
        .collect();

    serde_json::json!({
        "summary": {
            "model": data.report.model,
            "start_step": data.report.start_step,
            "end_step": data.report.end_step,
            "frames": data.frame_count(),
            "tensors": data.tensors.len(),
            "low": count(SparsityLevel::Low),
            "elevated": count(SparsityLevel::Elevated),
            "high": count(SparsityLevel::High),
        },
        "tensors": tensors,
        "flagged": data.flagged().iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
    })
}

/// Write the JSON export of a processed window to `path`.
pub fn write_export(data: &WindowData, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&export_value(data))?;
    std::fs::write(path, json)?;
    Ok(())
}
