//! WindowReport - the summary of one completed monitoring window.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{SchemaVersion, SparsityFrame};

/// Cross-frame statistics for one tensor over a completed window.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct TensorTrend {
    /// Number of frames the tensor appeared in.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub samples: u32,

    /// Mean sparsity ratio.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub mean: f64,

    /// Lowest sparsity ratio.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub min: f64,

    /// Highest sparsity ratio.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub max: f64,

    /// Ratio at the first sample.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub first: f64,

    /// Ratio at the last sample.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub last: f64,

    /// Least-squares slope of ratio against training step.
    #[cfg_attr(feature = "minicbor", n(6))]
    pub slope: f64,

    /// Mean fraction of mask cells that changed between consecutive samples.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(7))]
    pub mask_churn: Option<f64>,
}

impl TensorTrend {
    /// Net change in ratio across the window.
    pub fn delta(&self) -> f64 {
        self.last - self.first
    }
}

/// One completed window: every frame it held plus the per-tensor summary.
///
/// This is the payload handed to renderers and written as an export
/// artifact.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct WindowReport {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Model tag used to name artifacts.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub model: String,

    /// Step of the first frame in the window.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub start_step: u64,

    /// Step of the last frame in the window.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub end_step: u64,

    /// Unix timestamp in milliseconds when the window completed.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub timestamp_ms: u64,

    /// Frames in step order.
    #[cfg_attr(feature = "minicbor", n(5))]
    pub frames: Vec<SparsityFrame>,

    /// Per-tensor trends keyed by tensor identifier.
    #[cfg_attr(feature = "minicbor", n(6))]
    pub summary: BTreeMap<String, TensorTrend>,
}

impl WindowReport {
    /// Create a report from frames in step order.
    ///
    /// The step range is taken from the first and last frame; an empty
    /// frame list yields the range `0..=0`.
    #[cfg(feature = "std")]
    pub fn new(
        model: impl Into<String>,
        frames: Vec<SparsityFrame>,
        summary: BTreeMap<String, TensorTrend>,
    ) -> Self {
        Self::with_timestamp(model, frames, summary, current_timestamp_ms())
    }

    /// Create a report with a specific timestamp.
    pub fn with_timestamp(
        model: impl Into<String>,
        frames: Vec<SparsityFrame>,
        summary: BTreeMap<String, TensorTrend>,
        timestamp_ms: u64,
    ) -> Self {
        let start_step = frames.first().map_or(0, |f| f.step);
        let end_step = frames.last().map_or(0, |f| f.step);
        Self {
            version: SchemaVersion::current(),
            model: model.into(),
            start_step,
            end_step,
            timestamp_ms,
            frames,
            summary,
        }
    }

    /// Deterministic artifact file stem: `{model}_sparsity_{start}-{end}`.
    pub fn artifact_stem(&self) -> String {
        format!("{}_sparsity_{}-{}", self.model, self.start_step, self.end_step)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the report holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Tensor identifiers present in the summary, in order.
    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.summary.keys().map(String::as_str)
    }

    /// `(step, ratio)` series for a tensor across the window.
    pub fn series(&self, tensor: &str) -> Vec<(u64, f64)> {
        self.frames
            .iter()
            .filter_map(|f| f.get(tensor).map(|t| (f.step, t.ratio)))
            .collect()
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
