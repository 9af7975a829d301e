// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # sparsewatch
//!
//! A training driver and terminal viewer for monitoring activation sparsity.
//!
//! The driver runs a training loop with a [`SparsityMonitor`](sparsewatch_sdk::SparsityMonitor)
//! attached as a hook. Every completed monitoring window is exported as a
//! report artifact and can be streamed to the viewer in the same process.
//! The viewer replays a window frame by frame: per-tensor ratios, trends
//! and the spatial zero pattern of convolutional activations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  train                                                        │
//! │  ┌─────────┐  step   ┌─────────┐  windows  ┌──────────────┐   │
//! │  │ Trainer │───────▶│  hooks  │──────────▶│ Output (file, │   │
//! │  │ +engine │        │ Sparsity│           │   channel)    │   │
//! │  └─────────┘        └─────────┘           └──────┬───────┘   │
//! └──────────────────────────────────────────────────┼───────────┘
//!                                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌──────────┐  │
//! │  │ source  │───▶│   app    │───▶│   ui    │───▶│ Terminal │  │
//! │  │ (input) │    │ (state)  │    │(render) │    │          │  │
//! │  └─────────┘    └──────────┘    └─────────┘    └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`train`]**: Training loop, execution engines, hooks and layered settings
//! - **[`source`]**: Report source abstraction ([`ReportSource`] trait) over artifact
//!   files and in-process channels
//! - **[`data`]**: Converts raw reports into level-annotated [`WindowData`] and
//!   tracks cross-window history
//! - **[`app`]**: Viewer state, navigation and frame playback
//! - **[`ui`]**: Terminal rendering using ratatui
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Train and write window artifacts
//! sparsewatch train --file-io --io-path resnet_50Kiter
//!
//! # Browse the artifacts
//! sparsewatch view resnet_50Kiter
//!
//! # Train and watch windows as they complete
//! sparsewatch train --live
//! ```
//!
//! ### As a library with file source
//!
//! ```
//! use sparsewatch::{App, FileSource, Thresholds};
//!
//! let source = Box::new(FileSource::new("resnet_50Kiter"));
//! let app = App::new(source, Thresholds::default());
//! ```
//!
//! ### Following a training run in memory
//!
//! ```no_run
//! use sparsewatch::train::{build_trainer, TrainSettings};
//! use sparsewatch::{App, ChannelSource, Thresholds};
//! use sparsewatch_sdk::Output;
//!
//! let (output, rx) = Output::channel(64);
//! let mut trainer = build_trainer(&TrainSettings::default(), Some(Box::new(output))).unwrap();
//! std::thread::spawn(move || trainer.run());
//!
//! let app = App::new(Box::new(ChannelSource::new(rx, "training")), Thresholds::default());
//! ```

pub mod app;
pub mod data;
pub mod events;
pub mod source;
pub mod train;
pub mod ui;

// Re-export main types for convenience
pub use app::{App, View};
pub use data::{History, SparsityLevel, TensorRow, Thresholds, WindowData};
pub use source::{load_report, ChannelSource, FileSource, ReportSource};
pub use train::{build_trainer, TrainSettings, TrainSummary, Trainer};
