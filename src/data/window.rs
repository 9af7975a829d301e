//! Window report processing for display.
//!
//! Turns a raw [`WindowReport`] into per-tensor rows annotated with a
//! sparsity level, and answers playback queries (ratio or mask of a tensor
//! at a given frame).

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use sparsewatch_types::{SparsityFrame, SpatialMask, TensorTrend, WindowReport};

use crate::source::load_report;

/// Ratios at which a tensor is flagged.
///
/// A persistently high fraction of zero activations usually means dead
/// units, so high sparsity is highlighted the way a backlog would be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Ratio from which a tensor is shown as elevated.
    pub elevated: f64,
    /// Ratio from which a tensor is shown as high.
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            elevated: 0.5,
            high: 0.9,
        }
    }
}

impl Thresholds {
    /// Classify a ratio.
    pub fn level(&self, ratio: f64) -> SparsityLevel {
        if ratio >= self.high {
            SparsityLevel::High
        } else if ratio >= self.elevated {
            SparsityLevel::Elevated
        } else {
            SparsityLevel::Low
        }
    }
}

/// How sparse a tensor is relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SparsityLevel {
    Low,
    Elevated,
    High,
}

impl SparsityLevel {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            SparsityLevel::Low => "LOW",
            SparsityLevel::Elevated => "MID",
            SparsityLevel::High => "HIGH",
        }
    }
}

/// One tensor's summary within a window.
#[derive(Debug, Clone)]
pub struct TensorRow {
    pub name: String,
    pub trend: TensorTrend,
    /// Level of the last ratio in the window.
    pub level: SparsityLevel,
    /// Mask dimensions, when the tensor carries spatial masks.
    pub mask_dims: Option<(u32, u32)>,
}

/// A processed window ready for display.
#[derive(Debug, Clone)]
pub struct WindowData {
    pub report: WindowReport,
    pub tensors: Vec<TensorRow>,
    pub last_updated: Instant,
}

impl WindowData {
    /// Load and process a report artifact.
    pub fn load(path: &Path, thresholds: &Thresholds) -> Result<Self> {
        Ok(Self::from_report(load_report(path)?, thresholds))
    }

    /// Process a report received from any source.
    pub fn from_report(report: WindowReport, thresholds: &Thresholds) -> Self {
        let tensors = report
            .summary
            .iter()
            .map(|(name, trend)| {
                let mask_dims = report
                    .frames
                    .iter()
                    .filter_map(|f| f.get(name)?.mask.as_ref())
                    .map(|m| (m.height, m.width))
                    .next();
                TensorRow {
                    name: name.clone(),
                    trend: trend.clone(),
                    level: thresholds.level(trend.last),
                    mask_dims,
                }
            })
            .collect();

        Self {
            report,
            tensors,
            last_updated: Instant::now(),
        }
    }

    /// Number of frames available for playback.
    pub fn frame_count(&self) -> usize {
        self.report.frames.len()
    }

    /// Frame at playback position `index`.
    pub fn frame(&self, index: usize) -> Option<&SparsityFrame> {
        self.report.frames.get(index)
    }

    /// Step at playback position `index`.
    pub fn step_at(&self, index: usize) -> Option<u64> {
        self.frame(index).map(|f| f.step)
    }

    /// Ratio of `tensor` at playback position `index`.
    pub fn ratio_at(&self, tensor: &str, index: usize) -> Option<f64> {
        self.frame(index)?.get(tensor).map(|t| t.ratio)
    }

    /// Spatial mask of `tensor` at playback position `index`.
    pub fn mask_at(&self, tensor: &str, index: usize) -> Option<&SpatialMask> {
        self.frame(index)?.get(tensor)?.mask.as_ref()
    }

    /// Ratios of `tensor` up to and including `index`, normalized to 0-7
    /// for sparkline display. Ratios are absolute, so the full bar means
    /// every activation was zero.
    pub fn sparkline(&self, tensor: &str, index: usize) -> Vec<u8> {
        self.report
            .frames
            .iter()
            .take(index.saturating_add(1))
            .filter_map(|f| f.get(tensor))
            .map(|t| ((t.ratio * 7.0).round() as u8).min(7))
            .collect()
    }

    /// Tensors at or above the elevated threshold, highest level first.
    pub fn flagged(&self) -> Vec<&TensorRow> {
        let mut flagged: Vec<&TensorRow> =
            self.tensors.iter().filter(|t| t.level != SparsityLevel::Low).collect();
        flagged.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.name.cmp(&b.name)));
        flagged
    }
}
