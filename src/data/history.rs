//! Cross-window history for sparklines and drift.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use super::window::WindowData;

/// Maximum number of windows to keep.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks per-tensor window means over the windows seen so far.
///
/// A replayed artifact contributes a single window; following a live run
/// or an artifact directory accumulates one entry per completed window.
#[derive(Debug, Clone)]
pub struct History {
    /// Window mean ratio per tensor (tensor name -> means).
    pub tensor_means: HashMap<String, VecDeque<f64>>,
    /// Step ranges of the recorded windows.
    pub windows: VecDeque<(u64, u64)>,
    /// When each window was received.
    pub timestamps: VecDeque<Instant>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            tensor_means: HashMap::new(),
            windows: VecDeque::new(),
            timestamps: VecDeque::new(),
        }
    }

    /// Record a window. A window with the same step range as the last
    /// recorded one is ignored.
    pub fn record(&mut self, data: &WindowData) {
        let range = (data.report.start_step, data.report.end_step);
        if self.windows.back() == Some(&range) {
            return;
        }

        for tensor in &data.tensors {
            let means = self.tensor_means.entry(tensor.name.clone()).or_default();
            means.push_back(tensor.trend.mean);
            if means.len() > MAX_HISTORY_SIZE {
                means.pop_front();
            }
        }

        self.windows.push_back(range);
        if self.windows.len() > MAX_HISTORY_SIZE {
            self.windows.pop_front();
        }
        self.timestamps.push_back(data.last_updated);
        if self.timestamps.len() > MAX_HISTORY_SIZE {
            self.timestamps.pop_front();
        }
    }

    /// Number of windows recorded.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if no window has been recorded.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Get sparkline data for a tensor's window means (normalized to 0-7
    /// for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn get_means_sparkline(&self, tensor: &str) -> Vec<u8> {
        let Some(values) = self.tensor_means.get(tensor) else {
            return Vec::new();
        };
        if values.len() < 2 {
            return Vec::new();
        }

        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        let range = (max - min).max(f64::EPSILON);

        values
            .iter()
            .map(|&v| {
                let normalized = ((v - min) / range * 7.0) as u8;
                normalized.min(7)
            })
            .collect()
    }

    /// Change in a tensor's window mean since the previous window.
    ///
    /// Returns None if there's not enough history.
    pub fn get_drift(&self, tensor: &str) -> Option<f64> {
        let means = self.tensor_means.get(tensor)?;
        if means.len() < 2 {
            return None;
        }
        let current = *means.back()?;
        let previous = *means.get(means.len() - 2)?;
        Some(current - previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Thresholds;
    use sparsewatch_types::{SparsityFrame, WindowReport};

    fn window(start: u64, zeros: u64) -> WindowData {
        let frames = vec![
            SparsityFrame::builder(start).tensor("conv1", |t| t.counts(zeros, 10)).build(),
            SparsityFrame::builder(start + 10).tensor("conv1", |t| t.counts(zeros, 10)).build(),
        ];
        let summary = sparsewatch_sdk::summarize(&frames);
        WindowData::from_report(
            WindowReport::with_timestamp("m", frames, summary, 0),
            &Thresholds::default(),
        )
    }

    #[test]
    fn records_one_entry_per_window() {
        let mut history = History::new();
        history.record(&window(0, 2));
        history.record(&window(0, 2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.get_drift("conv1"), None);

        history.record(&window(20, 5));
        assert_eq!(history.len(), 2);
        let drift = history.get_drift("conv1").unwrap();
        assert!((drift - 0.3).abs() < 1e-9);
    }

    #[test]
    fn sparkline_spans_full_range() {
        let mut history = History::new();
        for (i, zeros) in [1, 5, 9].iter().enumerate() {
            history.record(&window(i as u64 * 100, *zeros));
        }
        assert_eq!(history.get_means_sparkline("conv1"), vec![0, 3, 7]);
        assert!(history.get_means_sparkline("missing").is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY_SIZE as u64 + 5) {
            history.record(&window(i * 100, 1));
        }
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.tensor_means["conv1"].len(), MAX_HISTORY_SIZE);
    }
}
