//! Monitor configuration.

use std::collections::BTreeSet;

use sparsewatch_types::DataFormat;

use crate::error::MonitorError;
use crate::output::is_file_safe_tag;

/// Operating mode of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Sample tensors on scheduled steps.
    #[default]
    Monitor,
    /// Never sample; the monitor adds no work to any step.
    Disabled,
}

/// Which candidates to fetch on a monitored step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Fetch every candidate on every monitored step.
    #[default]
    All,
    /// Fetch `per_step` candidates per monitored step, rotating through the
    /// candidate list so every tensor is visited in turn.
    RoundRobin {
        /// Number of candidates fetched per monitored step.
        per_step: usize,
    },
}

/// Immutable configuration shared by the scheduler and the aggregator.
///
/// Build one with [`MonitorConfig::builder()`]; `build()` rejects
/// non-positive `interval`/`period` and an empty candidate set.
///
/// # Example
///
/// ```rust
/// use sparsewatch_sdk::{MonitorConfig, Mode};
/// use sparsewatch_types::DataFormat;
///
/// let config = MonitorConfig::builder()
///     .mode(Mode::Monitor)
///     .data_format(DataFormat::Nhwc)
///     .interval(10)
///     .period(500)
///     .candidates(["conv1/relu", "conv2/relu"])
///     .build()
///     .unwrap();
///
/// assert_eq!(config.interval(), 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    mode: Mode,
    data_format: DataFormat,
    interval: u64,
    period: usize,
    candidates: Vec<String>,
    selection: SelectionPolicy,
    zero_threshold: f32,
    track_spatial: bool,
    model: String,
}

impl MonitorConfig {
    /// Create a validated configuration with default threshold, selection,
    /// spatial tracking and model tag.
    pub fn new(
        mode: Mode,
        data_format: DataFormat,
        interval: u64,
        period: usize,
        candidates: Vec<String>,
    ) -> Result<Self, MonitorError> {
        Self::builder()
            .mode(mode)
            .data_format(data_format)
            .interval(interval)
            .period(period)
            .candidates(candidates)
            .build()
    }

    /// Create a builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::new()
    }

    /// Operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the monitor samples at all.
    pub fn is_enabled(&self) -> bool {
        self.mode == Mode::Monitor
    }

    /// Layout used to interpret rank-4 tensors.
    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    /// Steps between monitored samples.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Monitored samples per window.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Ordered tensors eligible for introspection.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Whether `name` belongs to the candidate set.
    pub fn is_candidate(&self, name: &str) -> bool {
        self.candidates.iter().any(|c| c == name)
    }

    /// Per-step selection policy.
    pub fn selection(&self) -> SelectionPolicy {
        self.selection
    }

    /// Magnitude at or below which an element counts as zero.
    pub fn zero_threshold(&self) -> f32 {
        self.zero_threshold
    }

    /// Whether rank-4 tensors are reduced to spatial masks.
    pub fn track_spatial(&self) -> bool {
        self.track_spatial
    }

    /// Model tag used to name reports and artifacts.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Builder for [`MonitorConfig`].
#[derive(Debug, Clone)]
pub struct MonitorConfigBuilder {
    mode: Mode,
    data_format: DataFormat,
    interval: u64,
    period: usize,
    candidates: Vec<String>,
    selection: SelectionPolicy,
    zero_threshold: f32,
    track_spatial: bool,
    model: String,
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self {
            mode: Mode::Monitor,
            data_format: DataFormat::Nhwc,
            interval: 10,
            period: 500,
            candidates: Vec::new(),
            selection: SelectionPolicy::All,
            zero_threshold: 0.0,
            track_spatial: true,
            model: "model".to_string(),
        }
    }
}

impl MonitorConfigBuilder {
    /// Create a new builder.
    ///
    /// Defaults: monitor mode, NHWC, interval 10, period 500, exact-zero
    /// threshold, spatial tracking on, every candidate on every sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operating mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the tensor layout.
    pub fn data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    /// Set the number of steps between samples.
    pub fn interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Set the number of samples per window.
    pub fn period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Set the candidate tensors, replacing any added before.
    pub fn candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Append one candidate tensor.
    pub fn candidate(mut self, name: impl Into<String>) -> Self {
        self.candidates.push(name.into());
        self
    }

    /// Set the per-step selection policy.
    pub fn selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Set the near-zero threshold.
    pub fn zero_threshold(mut self, threshold: f32) -> Self {
        self.zero_threshold = threshold;
        self
    }

    /// Enable or disable spatial mask tracking.
    pub fn track_spatial(mut self, enabled: bool) -> Self {
        self.track_spatial = enabled;
        self
    }

    /// Set the model tag.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        if self.interval == 0 {
            return Err(MonitorError::invalid("interval must be positive"));
        }
        if self.period == 0 {
            return Err(MonitorError::invalid("period must be positive"));
        }
        if self.candidates.is_empty() {
            return Err(MonitorError::invalid("candidate set is empty"));
        }

        let mut seen = BTreeSet::new();
        for name in &self.candidates {
            if name.is_empty() {
                return Err(MonitorError::invalid("candidate names must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(MonitorError::invalid(format!(
                    "duplicate candidate '{}'",
                    name
                )));
            }
        }

        if !self.zero_threshold.is_finite() || self.zero_threshold < 0.0 {
            return Err(MonitorError::invalid(format!(
                "zero threshold must be finite and non-negative, got {}",
                self.zero_threshold
            )));
        }

        if let SelectionPolicy::RoundRobin { per_step: 0 } = self.selection {
            return Err(MonitorError::invalid(
                "round-robin selection needs at least one tensor per step",
            ));
        }

        if self.model.is_empty() {
            return Err(MonitorError::invalid("model tag must not be empty"));
        }
        if !is_file_safe_tag(&self.model) {
            return Err(MonitorError::invalid(format!(
                "model tag '{}' must not contain path separators or '..'",
                self.model
            )));
        }

        Ok(MonitorConfig {
            mode: self.mode,
            data_format: self.data_format,
            interval: self.interval,
            period: self.period,
            candidates: self.candidates,
            selection: self.selection,
            zero_threshold: self.zero_threshold,
            track_spatial: self.track_spatial,
            model: self.model,
        })
    }
}
