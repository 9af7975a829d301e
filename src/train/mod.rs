//! The training driver.
//!
//! A [`Trainer`] runs an [`ExecutionEngine`] one step at a time and drives a
//! list of [`TrainingHook`]s around each step: hooks say what to fetch before
//! the step and inspect the output after it. The sparsity monitor joins the
//! run as one more hook ([`SparsityHook`]).

pub mod engine;
pub mod hooks;
pub mod settings;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use sparsewatch_sdk::{Output, Render, SparsityMonitor};
use tracing::{debug, info, warn};

pub use engine::{ExecutionEngine, StepOutput, SyntheticEngine};
pub use hooks::{HookAction, LoggerHook, NanGuardHook, SparsityHook, StopAtStepHook, TrainingHook};
pub use settings::TrainSettings;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// Steps executed.
    pub steps_run: u64,
    /// Last step executed.
    pub last_step: Option<u64>,
    /// Loss of the last step.
    pub final_loss: Option<f32>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Whether the run was cancelled from outside.
    pub cancelled: bool,
}

/// Runs training steps sequentially until a hook asks to stop.
pub struct Trainer<E: ExecutionEngine> {
    engine: E,
    hooks: Vec<Box<dyn TrainingHook>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<E: ExecutionEngine> Trainer<E> {
    /// Create a trainer with no hooks.
    ///
    /// Without a stopping hook the run only ends on cancellation or error.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            hooks: Vec::new(),
            cancel: None,
        }
    }

    /// Add a hook. Hooks run in the order they were added.
    pub fn hook(mut self, hook: impl TrainingHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Stop before the next step once `flag` is set.
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The engine being driven.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run until a hook stops the run, a hook fails it, the engine errors,
    /// or the run is cancelled.
    pub fn run(&mut self) -> Result<TrainSummary> {
        let started = Instant::now();
        for hook in &mut self.hooks {
            hook.begin();
        }

        let mut last_step = None;
        let mut final_loss = None;
        let mut cancelled = false;
        let result = self.run_steps(&mut last_step, &mut final_loss, &mut cancelled);

        for hook in &mut self.hooks {
            hook.end(last_step);
        }
        result?;

        let summary = TrainSummary {
            steps_run: last_step.map_or(0, |s| s + 1),
            last_step,
            final_loss,
            elapsed: started.elapsed(),
            cancelled,
        };
        info!(
            steps = summary.steps_run,
            loss = ?summary.final_loss,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            cancelled,
            "training finished"
        );
        Ok(summary)
    }

    fn run_steps(
        &mut self,
        last_step: &mut Option<u64>,
        final_loss: &mut Option<f32>,
        cancelled: &mut bool,
    ) -> Result<()> {
        let mut step = 0u64;
        loop {
            if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(step, "training cancelled");
                *cancelled = true;
                return Ok(());
            }

            let mut fetch: Vec<String> = Vec::new();
            for hook in &mut self.hooks {
                for name in hook.before_step(step) {
                    if !fetch.contains(&name) {
                        fetch.push(name);
                    }
                }
            }
            if !fetch.is_empty() {
                debug!(step, tensors = fetch.len(), "fetching tensors");
            }

            let output = self
                .engine
                .run(step, &fetch)
                .with_context(|| format!("Step {} failed", step))?;
            *last_step = Some(step);
            *final_loss = Some(output.loss);

            let mut stop = false;
            for hook in &mut self.hooks {
                match hook.after_step(step, &output) {
                    HookAction::Continue => {}
                    HookAction::Stop => {
                        debug!(step, hook = hook.name(), "stop requested");
                        stop = true;
                    }
                    HookAction::Fail(reason) => bail!("{} hook failed: {}", hook.name(), reason),
                }
            }
            if stop {
                return Ok(());
            }

            step = match step.checked_add(1) {
                Some(next) => next,
                None => return Ok(()),
            };
        }
    }
}

/// Remove and recreate the training directory.
pub fn reset_train_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to clear {}", path.display()))?;
    }
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}

/// Build the standard trainer for `settings`: synthetic engine, logger,
/// stop-at-step, NaN guard and sparsity hooks.
///
/// `extra_output` receives completed windows in addition to the file output
/// selected by `file_io`.
pub fn build_trainer(
    settings: &TrainSettings,
    extra_output: Option<Box<dyn Render>>,
) -> Result<Trainer<SyntheticEngine>> {
    settings.validate()?;
    let engine = SyntheticEngine::new(
        settings.data_format,
        settings.batch_size,
        settings.max_steps,
        settings.seed,
    );
    if settings.log_device_placement {
        info!(engine = %engine.description(), "device placement");
    }

    let config = settings.monitor_config(&engine.candidates())?;
    let file_output = Output::from_flags(settings.file_io, settings.resolved_io_path()?);
    let mut builder = SparsityMonitor::builder().config(config).output(file_output);
    if let Some(output) = extra_output {
        builder = builder.output(output);
    }
    let monitor = builder.build()?;

    Ok(Trainer::new(engine)
        .hook(LoggerHook::new(settings.log_frequency, settings.batch_size))
        .hook(StopAtStepHook::new(settings.max_steps))
        .hook(NanGuardHook)
        .hook(SparsityHook::new(monitor)))
}
