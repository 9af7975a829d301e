//! The aggregator: turns fetched tensors into frames and completes windows.

use std::path::PathBuf;
use std::sync::Arc;

use sparsewatch_types::{SparsityFrame, WindowReport};
use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::output::Render;
use crate::scheduler::StepScheduler;
use crate::summary::summarize;
use crate::window::{MonitorWindow, WindowState};
use crate::FetchResults;

/// What a successful `ingest` did with the frame.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The frame was appended; the window is not full yet.
    Recorded {
        /// Frames now held by the window.
        pending: usize,
    },

    /// The frame filled the window, a reporting cycle ran, and the window
    /// was cleared.
    WindowCompleted {
        /// Step of the first frame in the completed window.
        start_step: u64,
        /// Step of the last frame in the completed window.
        end_step: u64,
        /// Artifacts written by file outputs.
        artifacts: Vec<PathBuf>,
        /// Outputs that failed. The window is cleared regardless.
        failed_exports: Vec<MonitorError>,
    },
}

/// Owns the rolling window and drives reporting cycles.
///
/// Every call to [`ingest`](Self::ingest) either appends exactly one frame
/// or leaves the window untouched and returns a
/// [`MonitorError::DataContractViolation`].
#[derive(Debug)]
pub struct Aggregator {
    config: Arc<MonitorConfig>,
    scheduler: StepScheduler,
    analyzer: Analyzer,
    window: MonitorWindow,
    outputs: Vec<Box<dyn Render>>,
    last_step: Option<u64>,
    last_report: Option<WindowReport>,
}

impl Aggregator {
    /// Create an aggregator with no outputs (purely in-memory).
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        let analyzer = Analyzer {
            data_format: config.data_format(),
            zero_threshold: config.zero_threshold(),
            track_spatial: config.track_spatial(),
        };
        Self {
            scheduler: StepScheduler::new(config.clone()),
            window: MonitorWindow::new(config.period()),
            analyzer,
            config,
            outputs: Vec::new(),
            last_step: None,
            last_report: None,
        }
    }

    /// Add an output that receives every completed window.
    pub fn add_output(&mut self, output: Box<dyn Render>) {
        self.outputs.push(output);
    }

    /// Whether any configured output writes to the filesystem.
    pub fn writes_files(&self) -> bool {
        self.outputs.iter().any(|o| o.writes_files())
    }

    /// The shared configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Frames held by the current window.
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    /// Current window state.
    pub fn state(&self) -> WindowState {
        self.window.state()
    }

    /// The current (incomplete) window.
    pub fn window(&self) -> &MonitorWindow {
        &self.window
    }

    /// Last step whose frame was accepted.
    pub fn last_step(&self) -> Option<u64> {
        self.last_step
    }

    /// Summary of the most recently completed window.
    pub fn last_report(&self) -> Option<&WindowReport> {
        self.last_report.as_ref()
    }

    /// Analyze the values fetched for `step` and append them to the window.
    ///
    /// `values` must hold exactly the tensors the scheduler selected for
    /// `step`. When the frame fills the window, the window is summarized,
    /// handed to every output, and cleared.
    pub fn ingest(&mut self, values: &FetchResults, step: u64) -> Result<IngestOutcome, MonitorError> {
        let frame = self.analyze(values, step)?;

        self.last_step = Some(step);
        match self.window.push(frame) {
            Ok(WindowState::Full) => Ok(self.complete_window()),
            Ok(_) => {
                debug!(step, pending = self.window.len(), "frame recorded");
                Ok(IngestOutcome::Recorded {
                    pending: self.window.len(),
                })
            }
            // Unreachable while every full push completes the window.
            Err(frame) => Err(MonitorError::violation(
                frame.step,
                "window already full",
            )),
        }
    }

    /// Validate `values` against the schedule and build the frame for `step`.
    fn analyze(&self, values: &FetchResults, step: u64) -> Result<SparsityFrame, MonitorError> {
        if let Some(last) = self.last_step {
            if step <= last {
                return Err(MonitorError::violation(
                    step,
                    format!("step is not after the last ingested step {}", last),
                ));
            }
        }

        let ctx = self.scheduler.decide(step);
        if !ctx.is_monitored() {
            return Err(MonitorError::violation(step, "step was not scheduled for monitoring"));
        }

        let missing: Vec<&str> = ctx
            .selected
            .iter()
            .filter(|name| !values.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(MonitorError::violation(
                step,
                format!("missing fetched tensors: {}", missing.join(", ")),
            ));
        }

        let extra: Vec<&str> = values
            .keys()
            .filter(|name| !ctx.requests(name))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            return Err(MonitorError::violation(
                step,
                format!("unexpected fetched tensors: {}", extra.join(", ")),
            ));
        }

        let mut builder = SparsityFrame::builder(step);
        for name in &ctx.selected {
            // Presence checked above.
            if let Some(tensor) = values.get(name) {
                let stats = self.analyzer.analyze(name, &tensor.view(), step)?;
                builder = builder.tensor_stats(name.clone(), stats);
            }
        }
        Ok(builder.build())
    }

    fn complete_window(&mut self) -> IngestOutcome {
        let frames = self.window.take();
        let summary = summarize(&frames);
        let report = WindowReport::new(self.config.model(), frames, summary);

        let mut artifacts = Vec::new();
        let mut failed_exports = Vec::new();
        for output in &mut self.outputs {
            match output.render(&report) {
                Ok(paths) => artifacts.extend(paths),
                Err(err) => {
                    warn!(
                        start = report.start_step,
                        end = report.end_step,
                        error = %err,
                        "window export failed"
                    );
                    failed_exports.push(err);
                }
            }
        }

        info!(
            model = %report.model,
            start = report.start_step,
            end = report.end_step,
            tensors = report.summary.len(),
            artifacts = artifacts.len(),
            "monitoring window completed"
        );

        let outcome = IngestOutcome::WindowCompleted {
            start_step: report.start_step,
            end_step: report.end_step,
            artifacts,
            failed_exports,
        };
        self.last_report = Some(report);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use ndarray::{ArrayD, IxDyn};

    fn config(interval: u64, period: usize) -> Arc<MonitorConfig> {
        Arc::new(
            MonitorConfig::builder()
                .interval(interval)
                .period(period)
                .candidates(["conv1", "fc"])
                .model("resnet")
                .build()
                .unwrap(),
        )
    }

    fn values(zero_fraction_of_conv: f32) -> FetchResults {
        // conv1 NHWC [1, 2, 2, 1]; fc [1, 4]
        let cells = (zero_fraction_of_conv * 4.0) as usize;
        let conv: Vec<f32> = (0..4).map(|i| if i < cells { 0.0 } else { 1.0 }).collect();
        let mut map = FetchResults::new();
        map.insert(
            "conv1".to_string(),
            ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 1]), conv).unwrap(),
        );
        map.insert("fc".to_string(), ArrayD::from_elem(IxDyn(&[1, 4]), 0.5));
        map
    }

    #[test]
    fn records_frames_until_period() {
        let mut agg = Aggregator::new(config(10, 3));
        assert_eq!(agg.state(), WindowState::Empty);

        assert!(matches!(
            agg.ingest(&values(0.5), 0).unwrap(),
            IngestOutcome::Recorded { pending: 1 }
        ));
        assert!(matches!(
            agg.ingest(&values(0.5), 10).unwrap(),
            IngestOutcome::Recorded { pending: 2 }
        ));
        assert_eq!(agg.state(), WindowState::Accumulating);

        match agg.ingest(&values(1.0), 20).unwrap() {
            IngestOutcome::WindowCompleted {
                start_step,
                end_step,
                artifacts,
                failed_exports,
            } => {
                assert_eq!((start_step, end_step), (0, 20));
                assert!(artifacts.is_empty());
                assert!(failed_exports.is_empty());
            }
            other => panic!("expected completed window, got {:?}", other),
        }
        assert_eq!(agg.pending(), 0);
        assert_eq!(agg.state(), WindowState::Empty);

        let report = agg.last_report().unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report.summary["conv1"].first, 0.5);
        assert_eq!(report.summary["conv1"].last, 1.0);
        assert_eq!(report.summary["fc"].mean, 0.0);
    }

    #[test]
    fn frame_carries_ratio_and_mask() {
        let mut agg = Aggregator::new(config(1, 10));
        agg.ingest(&values(0.5), 0).unwrap();
        let frame = &agg.window().frames()[0];

        let conv = frame.get("conv1").unwrap();
        assert_eq!(conv.ratio, 0.5);
        assert_eq!(conv.mask.as_ref().unwrap().zero_count(), 2);
        assert!(!frame.get("fc").unwrap().has_mask());
    }

    #[test]
    fn missing_key_drops_frame() {
        let mut agg = Aggregator::new(config(10, 3));
        let mut partial = values(0.5);
        partial.remove("fc");

        let err = agg.ingest(&partial, 0).unwrap_err();
        assert!(matches!(err, MonitorError::DataContractViolation { step: 0, ref reason } if reason.contains("fc")));
        assert_eq!(agg.pending(), 0);
        assert_eq!(agg.last_step(), None);
    }

    #[test]
    fn extra_key_drops_frame() {
        let mut agg = Aggregator::new(config(10, 3));
        let mut extended = values(0.5);
        extended.insert("logits".to_string(), ArrayD::zeros(IxDyn(&[1, 2])));

        assert!(agg.ingest(&extended, 0).is_err());
        assert_eq!(agg.pending(), 0);
    }

    #[test]
    fn empty_tensor_drops_frame() {
        let mut agg = Aggregator::new(config(10, 3));
        let mut bad = values(0.5);
        bad.insert("conv1".to_string(), ArrayD::zeros(IxDyn(&[0])));

        let err = agg.ingest(&bad, 0).unwrap_err();
        assert!(matches!(err, MonitorError::DataContractViolation { step: 0, .. }));
        assert_eq!(agg.pending(), 0);
    }

    #[test]
    fn flat_tensor_is_recorded_without_mask() {
        let mut agg = Aggregator::new(config(10, 3));
        let mut flat = values(0.5);
        flat.insert("conv1".to_string(), ArrayD::zeros(IxDyn(&[4])));

        agg.ingest(&flat, 0).unwrap();
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn unscheduled_and_replayed_steps_are_rejected() {
        let mut agg = Aggregator::new(config(10, 5));
        assert!(agg.ingest(&values(0.5), 5).is_err());

        agg.ingest(&values(0.5), 10).unwrap();
        assert!(agg.ingest(&values(0.5), 10).is_err());
        assert!(agg.ingest(&values(0.5), 0).is_err());
        assert_eq!(agg.pending(), 1);

        // Gaps are fine.
        agg.ingest(&values(0.5), 40).unwrap();
        assert_eq!(agg.pending(), 2);
    }

    #[test]
    fn export_failure_still_clears_window() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut agg = Aggregator::new(config(1, 2));
        agg.add_output(Box::new(Output::json(file.path())));

        agg.ingest(&values(0.5), 0).unwrap();
        match agg.ingest(&values(0.5), 1).unwrap() {
            IngestOutcome::WindowCompleted { failed_exports, .. } => {
                assert_eq!(failed_exports.len(), 1);
            }
            other => panic!("expected completed window, got {:?}", other),
        }
        assert_eq!(agg.pending(), 0);
        assert!(agg.last_report().is_some());
    }

    #[test]
    fn json_output_receives_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = Aggregator::new(config(5, 2));
        agg.add_output(Box::new(Output::json(dir.path())));
        assert!(agg.writes_files());

        agg.ingest(&values(0.25), 5).unwrap();
        let outcome = agg.ingest(&values(0.75), 10).unwrap();
        let IngestOutcome::WindowCompleted { artifacts, .. } = outcome else {
            panic!("expected completed window");
        };
        assert_eq!(artifacts, vec![dir.path().join("resnet_sparsity_5-10.json")]);
        assert!(artifacts[0].exists());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn window_length_is_min_of_calls_and_period(period in 1usize..20, calls in 0usize..60) {
            let config = Arc::new(
                MonitorConfig::builder()
                    .interval(1)
                    .period(period)
                    .candidate("t")
                    .build()
                    .unwrap(),
            );
            let mut agg = Aggregator::new(config);
            let mut completed = 0;
            for step in 0..calls as u64 {
                let mut values = FetchResults::new();
                values.insert("t".to_string(), ArrayD::zeros(IxDyn(&[2, 3])));
                match agg.ingest(&values, step).unwrap() {
                    IngestOutcome::Recorded { pending } => {
                        prop_assert!(pending < period);
                        prop_assert_eq!(pending, (step as usize % period) + 1);
                    }
                    IngestOutcome::WindowCompleted { .. } => {
                        completed += 1;
                        prop_assert_eq!(agg.pending(), 0);
                    }
                }
                prop_assert!(agg.pending() <= period);
            }
            prop_assert_eq!(completed, calls / period);
            prop_assert_eq!(agg.pending(), calls % period);
        }
    }
}
