//! Report sources for the viewer.
//!
//! A source hands the viewer completed monitoring windows, either by
//! watching exported artifacts on disk or by receiving them in memory from
//! a training run in the same process.

mod channel;
mod file;

pub use channel::ChannelSource;
pub use file::{load_report, FileSource};

use std::fmt::Debug;

use sparsewatch_types::WindowReport;

/// Trait for receiving window reports from various sources.
///
/// # Example
///
/// ```
/// use sparsewatch::{FileSource, ReportSource};
///
/// let mut source = FileSource::new("resnet_50Kiter");
/// if let Some(report) = source.poll() {
///     println!("Window {}-{}", report.start_step, report.end_step);
/// }
/// ```
pub trait ReportSource: Send + Debug {
    /// Poll for the latest report.
    ///
    /// Returns `Some(report)` if a new window is available, `None`
    /// otherwise. This method must not block.
    fn poll(&mut self) -> Option<WindowReport>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Returns the error message if the last poll failed.
    fn error(&self) -> Option<&str>;
}
