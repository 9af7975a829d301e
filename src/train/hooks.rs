//! Training hooks: per-step callbacks the trainer drives in order.

use std::time::Instant;

use sparsewatch_sdk::{FetchResults, MonitorStats, SparsityMonitor, StepContext, StepOutcome};
use tracing::{debug, error, info};

use super::engine::StepOutput;

/// What a hook asks the trainer to do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Carry on training.
    Continue,
    /// Stop cleanly after this step.
    Stop,
    /// Abort the run with an error.
    Fail(String),
}

/// Two-phase per-step hook.
///
/// `before_step` returns the tensors the hook wants fetched alongside the
/// step; `after_step` receives the step's output. All methods except
/// `name` have no-op defaults.
pub trait TrainingHook: Send {
    /// Called once before the first step.
    fn begin(&mut self) {}

    /// Tensors to fetch for `step`.
    fn before_step(&mut self, _step: u64) -> Vec<String> {
        Vec::new()
    }

    /// Consume the output of `step`.
    fn after_step(&mut self, _step: u64, _output: &StepOutput) -> HookAction {
        HookAction::Continue
    }

    /// Called once after the last step, with the last step that ran.
    fn end(&mut self, _last_step: Option<u64>) {}

    /// Hook name for logging.
    fn name(&self) -> &'static str;
}

/// Logs loss and throughput every `log_frequency` steps.
#[derive(Debug)]
pub struct LoggerHook {
    log_frequency: u64,
    batch_size: usize,
    last_log: Option<Instant>,
}

impl LoggerHook {
    /// Create a logger hook.
    pub fn new(log_frequency: u64, batch_size: usize) -> Self {
        Self {
            log_frequency: log_frequency.max(1),
            batch_size,
            last_log: None,
        }
    }
}

impl TrainingHook for LoggerHook {
    fn begin(&mut self) {
        self.last_log = Some(Instant::now());
    }

    fn after_step(&mut self, step: u64, output: &StepOutput) -> HookAction {
        if step % self.log_frequency != 0 {
            return HookAction::Continue;
        }

        let now = Instant::now();
        let elapsed = self
            .last_log
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_log = Some(now);

        let steps = if step == 0 { 1 } else { self.log_frequency };
        let sec_per_batch = elapsed / steps as f64;
        let examples_per_sec = if elapsed > 0.0 {
            (steps as f64 * self.batch_size as f64) / elapsed
        } else {
            0.0
        };

        info!(
            step,
            loss = output.loss,
            "step {}, loss = {:.2} ({:.1} examples/sec; {:.3} sec/batch)",
            step,
            output.loss,
            examples_per_sec,
            sec_per_batch
        );
        HookAction::Continue
    }

    fn name(&self) -> &'static str {
        "logger"
    }
}

/// Stops training once `max_steps` steps have run.
#[derive(Debug, Clone, Copy)]
pub struct StopAtStepHook {
    max_steps: u64,
}

impl StopAtStepHook {
    /// Stop after steps `0..max_steps`.
    pub fn new(max_steps: u64) -> Self {
        Self { max_steps }
    }
}

impl TrainingHook for StopAtStepHook {
    fn after_step(&mut self, step: u64, _output: &StepOutput) -> HookAction {
        if step.saturating_add(1) >= self.max_steps {
            HookAction::Stop
        } else {
            HookAction::Continue
        }
    }

    fn name(&self) -> &'static str {
        "stop_at_step"
    }
}

/// Fails the run when the loss stops being finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanGuardHook;

impl TrainingHook for NanGuardHook {
    fn after_step(&mut self, step: u64, output: &StepOutput) -> HookAction {
        if output.loss.is_finite() {
            return HookAction::Continue;
        }
        error!(step, loss = output.loss, "model diverged");
        HookAction::Fail(format!("Model diverged with loss = {} at step {}", output.loss, step))
    }

    fn name(&self) -> &'static str {
        "nan_guard"
    }
}

/// Adapts a [`SparsityMonitor`] to the hook list.
///
/// The monitor's scheduling decision becomes the fetch request, and the
/// fetched values are handed back after the step. Monitor failures never
/// stop training.
#[derive(Debug)]
pub struct SparsityHook {
    monitor: SparsityMonitor,
    current: Option<StepContext>,
}

impl SparsityHook {
    /// Wrap a monitor.
    pub fn new(monitor: SparsityMonitor) -> Self {
        Self {
            monitor,
            current: None,
        }
    }

    /// The wrapped monitor.
    pub fn monitor(&self) -> &SparsityMonitor {
        &self.monitor
    }

    /// Monitor counters so far.
    pub fn stats(&self) -> MonitorStats {
        self.monitor.stats()
    }
}

impl TrainingHook for SparsityHook {
    fn before_step(&mut self, step: u64) -> Vec<String> {
        let ctx = self.monitor.before_step(step);
        let selected = ctx.selected.clone();
        self.current = Some(ctx);
        selected
    }

    fn after_step(&mut self, step: u64, output: &StepOutput) -> HookAction {
        let selected = match self.current.take() {
            Some(ctx) if ctx.step == step => ctx.selected,
            _ => Vec::new(),
        };

        // Other hooks may have fetched tensors of their own.
        let outcome = if output.fetched.len() == selected.len() {
            self.monitor.after_step(&output.fetched, step)
        } else {
            let own: FetchResults = selected
                .iter()
                .filter_map(|name| output.fetched.get(name).map(|t| (name.clone(), t.clone())))
                .collect();
            self.monitor.after_step(&own, step)
        };

        if let StepOutcome::WindowCompleted {
            start_step,
            end_step,
            artifacts,
        } = &outcome
        {
            if let Some(report) = self.monitor.last_report() {
                for (name, trend) in &report.summary {
                    debug!(
                        tensor = %name,
                        mean = trend.mean,
                        slope = trend.slope,
                        "window trend"
                    );
                }
            }
            info!(
                start = start_step,
                end = end_step,
                artifacts = artifacts.len(),
                "sparsity window exported"
            );
        }
        HookAction::Continue
    }

    fn end(&mut self, last_step: Option<u64>) {
        let stats = self.monitor.stats();
        info!(
            last_step = ?last_step,
            recorded = stats.frames_recorded,
            dropped = stats.frames_dropped,
            windows = stats.windows_completed,
            failed_exports = stats.exports_failed,
            discarded = self.monitor.pending(),
            "sparsity monitor finished"
        );
    }

    fn name(&self) -> &'static str {
        "sparsity"
    }
}
