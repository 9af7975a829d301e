//! # sparsewatch-sdk
//!
//! Monitoring SDK for tracking activation sparsity while a network trains.
//!
//! The monitor piggybacks on the training step itself: before a step runs it
//! decides which intermediate tensors to fetch, and after the step it turns
//! the fetched values into sparsity statistics, keeps a bounded window of
//! them, and hands each completed window to the configured outputs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sparsewatch_sdk::{FetchResults, MonitorConfig, Output, SparsityMonitor};
//!
//! let config = MonitorConfig::builder()
//!     .interval(10)
//!     .period(500)
//!     .candidates(["conv1/relu", "conv2/relu"])
//!     .model("resnet")
//!     .build()
//!     .expect("valid monitor configuration");
//!
//! let mut monitor = SparsityMonitor::new(config, Output::json("resnet_50Kiter"));
//!
//! for step in 0..10_000 {
//!     // Ask what to fetch, run the step with that request...
//!     let ctx = monitor.before_step(step);
//!     let results: FetchResults = run_training_step(step, &ctx.selected);
//!     // ...and hand the fetched tensors back.
//!     monitor.after_step(&results, step);
//! }
//! # fn run_training_step(_: u64, _: &[String]) -> FetchResults { FetchResults::new() }
//! ```
//!
//! ## Features
//!
//! - **Bounded overhead**: tensors are fetched only every `interval` steps
//! - **Never aborts training**: bad frames and failed exports are logged and skipped
//! - **Multiple outputs**: JSON files, CBOR files, or an in-memory channel
//! - **Spatial patterns**: per-location masks for convolutional activations

mod aggregator;
mod analysis;
mod config;
mod error;
mod monitor;
mod output;
mod scheduler;
mod summary;
mod window;

use std::collections::BTreeMap;

use ndarray::ArrayD;

pub use aggregator::{Aggregator, IngestOutcome};
pub use analysis::{is_near_zero, near_zero_count, sparsity_ratio, spatial_mask, Analyzer};
pub use config::{Mode, MonitorConfig, MonitorConfigBuilder, SelectionPolicy};
pub use error::MonitorError;
pub use monitor::{MonitorStats, SparsityMonitor, SparsityMonitorBuilder, StepOutcome};
pub use output::{artifact_path, is_file_safe_tag, Output, Render};
pub use scheduler::{StepContext, StepScheduler};
pub use summary::{summarize, trend};
pub use window::{MonitorWindow, WindowState};

// Re-export types for convenience
pub use sparsewatch_types::{
    DataFormat, SpatialMask, SparsityFrame, TensorSparsity, TensorTrend, WindowReport,
};

/// Values returned by the execution engine for one step, keyed by tensor
/// identifier.
pub type FetchResults = BTreeMap<String, ArrayD<f32>>;
