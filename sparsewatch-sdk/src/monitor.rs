//! The monitor facade: the two-phase hook functions a training loop calls.

use std::path::PathBuf;
use std::sync::Arc;

use sparsewatch_types::WindowReport;
use tracing::{debug, warn};

use crate::aggregator::{Aggregator, IngestOutcome};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::output::{Output, Render};
use crate::scheduler::{StepContext, StepScheduler};
use crate::FetchResults;

/// What happened to a step after its results were handed to the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was not monitored and nothing was fetched.
    Idle,

    /// A frame was added to the window.
    Recorded {
        /// Frames now held by the window.
        pending: usize,
    },

    /// A frame completed the window and a reporting cycle ran.
    WindowCompleted {
        /// First step covered by the window.
        start_step: u64,
        /// Last step covered by the window.
        end_step: u64,
        /// Artifacts written for the window.
        artifacts: Vec<PathBuf>,
    },

    /// The fetched values broke the data contract; the frame was skipped.
    Dropped,
}

/// Running counters, useful for logging at the end of training.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Frames appended to a window.
    pub frames_recorded: u64,
    /// Frames rejected as data contract violations.
    pub frames_dropped: u64,
    /// Reporting cycles run.
    pub windows_completed: u64,
    /// Output failures across all reporting cycles.
    pub exports_failed: u64,
}

/// Sparsity monitor for a single sequential training run.
///
/// Call [`before_step`](Self::before_step) to learn what to fetch, run the
/// step with that fetch request, then pass the results to
/// [`after_step`](Self::after_step). Neither call returns an error: failures
/// are logged, counted, and the monitoring action is skipped, so the training
/// step is never interrupted.
///
/// # Example
///
/// ```rust
/// use ndarray::{ArrayD, IxDyn};
/// use sparsewatch_sdk::{FetchResults, MonitorConfig, SparsityMonitor, StepOutcome};
///
/// let config = MonitorConfig::builder()
///     .interval(10)
///     .period(3)
///     .candidates(["relu1"])
///     .build()
///     .unwrap();
/// let mut monitor = SparsityMonitor::builder().config(config).build().unwrap();
///
/// for step in 0..30 {
///     let ctx = monitor.before_step(step);
///     let mut results = FetchResults::new();
///     for name in &ctx.selected {
///         results.insert(name.clone(), ArrayD::zeros(IxDyn(&[1, 4, 4, 8])));
///     }
///     monitor.after_step(&results, step);
/// }
///
/// assert_eq!(monitor.stats().windows_completed, 1);
/// assert_eq!(monitor.last_report().unwrap().end_step, 20);
/// ```
#[derive(Debug)]
pub struct SparsityMonitor {
    scheduler: StepScheduler,
    aggregator: Aggregator,
    stats: MonitorStats,
}

impl SparsityMonitor {
    /// Create a monitor from a validated configuration and one output.
    pub fn new(config: MonitorConfig, output: impl Render + 'static) -> Self {
        Self::assemble(config, vec![Box::new(output)])
    }

    fn assemble(config: MonitorConfig, outputs: Vec<Box<dyn Render>>) -> Self {
        let config = Arc::new(config);
        let mut aggregator = Aggregator::new(config.clone());
        for output in outputs {
            aggregator.add_output(output);
        }
        debug!(
            interval = config.interval(),
            period = config.period(),
            candidates = config.candidates().len(),
            enabled = config.is_enabled(),
            "sparsity monitor ready"
        );
        Self {
            scheduler: StepScheduler::new(config),
            aggregator,
            stats: MonitorStats::default(),
        }
    }

    /// Create a builder for configuring the monitor.
    pub fn builder() -> SparsityMonitorBuilder {
        SparsityMonitorBuilder::new()
    }

    /// Create a monitor the way the training driver flags describe it:
    /// JSON artifacts in `io_path` when `file_io` is set, no I/O otherwise.
    pub fn from_flags(config: MonitorConfig, file_io: bool, io_path: impl Into<PathBuf>) -> Self {
        Self::new(config, Output::from_flags(file_io, io_path))
    }

    /// The configuration in use.
    pub fn config(&self) -> &MonitorConfig {
        self.scheduler.config()
    }

    /// First phase: decide what to fetch for `step`.
    pub fn before_step(&self, step: u64) -> StepContext {
        self.scheduler.decide(step)
    }

    /// Second phase: consume the values fetched for `step`.
    ///
    /// Results for an unmonitored step must be empty; anything else is
    /// treated as a data contract violation and dropped.
    pub fn after_step(&mut self, results: &FetchResults, step: u64) -> StepOutcome {
        if results.is_empty() && !self.scheduler.is_monitored_step(step) {
            return StepOutcome::Idle;
        }

        match self.aggregator.ingest(results, step) {
            Ok(IngestOutcome::Recorded { pending }) => {
                self.stats.frames_recorded += 1;
                StepOutcome::Recorded { pending }
            }
            Ok(IngestOutcome::WindowCompleted {
                start_step,
                end_step,
                artifacts,
                failed_exports,
            }) => {
                self.stats.frames_recorded += 1;
                self.stats.windows_completed += 1;
                self.stats.exports_failed += failed_exports.len() as u64;
                StepOutcome::WindowCompleted {
                    start_step,
                    end_step,
                    artifacts,
                }
            }
            Err(err) => {
                self.stats.frames_dropped += 1;
                self.report(&err);
                StepOutcome::Dropped
            }
        }
    }

    /// Counters since construction.
    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Summary of the most recently completed window.
    pub fn last_report(&self) -> Option<&WindowReport> {
        self.aggregator.last_report()
    }

    /// Frames held by the current, incomplete window.
    pub fn pending(&self) -> usize {
        self.aggregator.pending()
    }

    /// Whether completed windows are written to disk.
    pub fn writes_files(&self) -> bool {
        self.aggregator.writes_files()
    }

    fn report(&self, err: &MonitorError) {
        match err {
            MonitorError::DataContractViolation { step, reason } => {
                warn!(step, %reason, "dropping sparsity frame");
            }
            other => warn!(error = %other, "monitoring action skipped"),
        }
    }
}

/// Builder for configuring a [`SparsityMonitor`].
#[derive(Debug, Default)]
pub struct SparsityMonitorBuilder {
    config: Option<MonitorConfig>,
    outputs: Vec<Box<dyn Render>>,
}

impl SparsityMonitorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the monitor configuration.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add an output destination for completed windows.
    ///
    /// Multiple outputs can be added; each window is rendered to all of them.
    pub fn output(mut self, output: impl Render + 'static) -> Self {
        self.outputs.push(Box::new(output));
        self
    }

    /// Build the monitor.
    ///
    /// Fails with [`MonitorError::InvalidConfig`] when no configuration was
    /// given. Without outputs the monitor is purely in-memory.
    pub fn build(self) -> Result<SparsityMonitor, MonitorError> {
        let config = self
            .config
            .ok_or_else(|| MonitorError::invalid("no monitor configuration given"))?;
        Ok(SparsityMonitor::assemble(config, self.outputs))
    }
}
