//! Layered training settings.
//!
//! Settings are resolved in order: built-in defaults, an optional
//! configuration file (TOML, YAML or JSON, picked by extension), then
//! `SPARSEWATCH_*` environment variables. Command-line flags are applied on
//! top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sparsewatch_sdk::{DataFormat, Mode, MonitorConfig, SelectionPolicy};

/// Everything the training driver needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    /// Directory for run state. Cleared at the start of every run.
    pub train_dir: PathBuf,
    /// Number of steps to run.
    pub max_steps: u64,
    /// Steps between loss log lines.
    pub log_frequency: u64,
    /// Log engine placement details at startup.
    pub log_device_placement: bool,
    /// Examples per step.
    pub batch_size: usize,
    /// Steps between sparsity samples.
    pub monitor_interval: u64,
    /// Samples per monitoring window.
    pub monitor_period: usize,
    /// Write window artifacts to `io_path`.
    pub file_io: bool,
    /// Artifact directory; relative paths resolve against the working directory.
    pub io_path: PathBuf,
    /// Model tag used in artifact names.
    pub model: String,
    /// Activation layout.
    pub data_format: DataFormat,
    /// Magnitude at or below which an activation counts as zero.
    pub zero_threshold: f32,
    /// Fetch only this many tensors per monitored step, rotating through
    /// the candidates. `None` fetches every candidate.
    pub tensors_per_step: Option<usize>,
    /// Compute spatial masks for convolutional activations.
    pub track_spatial: bool,
    /// Disable the monitor entirely.
    pub monitor_disabled: bool,
    /// Seed for the synthetic engine.
    pub seed: u64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from("/tmp/sparsewatch_train"),
            max_steps: 10_000,
            log_frequency: 100,
            log_device_placement: false,
            batch_size: 128,
            monitor_interval: 10,
            monitor_period: 500,
            file_io: false,
            io_path: PathBuf::from("resnet_50Kiter"),
            model: "resnet".to_string(),
            data_format: DataFormat::Nhwc,
            zero_threshold: 0.0,
            tensors_per_step: None,
            track_spatial: true,
            monitor_disabled: false,
            seed: 42,
        }
    }
}

impl TrainSettings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&TrainSettings::default()).context("Failed to encode defaults")?,
        );

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let settings: TrainSettings = builder
            .add_source(Environment::with_prefix("SPARSEWATCH").try_parsing(true))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the driver cannot run with.
    ///
    /// Monitor-specific bounds are checked again when the monitor
    /// configuration is built.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            bail!("max_steps must be positive");
        }
        if self.log_frequency == 0 {
            bail!("log_frequency must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.model.is_empty() {
            bail!("model must not be empty");
        }
        Ok(())
    }

    /// Artifact directory as an absolute path.
    pub fn resolved_io_path(&self) -> Result<PathBuf> {
        if self.io_path.is_absolute() {
            return Ok(self.io_path.clone());
        }
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        Ok(cwd.join(&self.io_path))
    }

    /// Build the monitor configuration for the given candidate tensors.
    pub fn monitor_config(&self, candidates: &[String]) -> Result<MonitorConfig> {
        let mode = if self.monitor_disabled {
            Mode::Disabled
        } else {
            Mode::Monitor
        };
        let selection = match self.tensors_per_step {
            Some(per_step) => SelectionPolicy::RoundRobin { per_step },
            None => SelectionPolicy::All,
        };

        let config = MonitorConfig::builder()
            .mode(mode)
            .data_format(self.data_format)
            .interval(self.monitor_interval)
            .period(self.monitor_period)
            .candidates(candidates.iter().cloned())
            .selection(selection)
            .zero_threshold(self.zero_threshold)
            .track_spatial(self.track_spatial)
            .model(self.model.clone())
            .build()?;
        Ok(config)
    }
}
