//! Output adapters for completed windows.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use sparsewatch_types::WindowReport;
use tracing::debug;

use crate::error::MonitorError;

/// Narrow rendering interface between the aggregator and whatever turns a
/// completed window into an artifact.
///
/// Implementations return the files they wrote (empty for in-memory
/// outputs). Errors are reported to the aggregator, which logs them and
/// carries on.
pub trait Render: Send + Debug {
    /// Render one completed window.
    fn render(&mut self, report: &WindowReport) -> Result<Vec<PathBuf>, MonitorError>;

    /// Whether this output touches the filesystem.
    fn writes_files(&self) -> bool {
        false
    }
}

impl<R: Render + ?Sized> Render for Box<R> {
    fn render(&mut self, report: &WindowReport) -> Result<Vec<PathBuf>, MonitorError> {
        (**self).render(report)
    }

    fn writes_files(&self) -> bool {
        (**self).writes_files()
    }
}

/// Built-in output destinations for window reports.
#[derive(Debug)]
pub enum Output {
    /// Discard reports. Used whenever file output is disabled, so headless
    /// runs perform no I/O.
    Null,

    /// Write each report as pretty JSON to `dir/{stem}.json`.
    Json(PathBuf),

    /// Write each report as CBOR to `dir/{stem}.cbor`.
    #[cfg(feature = "minicbor")]
    Cbor(PathBuf),

    /// Send reports through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<WindowReport>),
}

impl Output {
    /// The no-op output.
    pub fn null() -> Self {
        Output::Null
    }

    /// Create a JSON file output writing into `dir`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sparsewatch_sdk::Output;
    ///
    /// let output = Output::json("sparsity");
    /// ```
    pub fn json(dir: impl Into<PathBuf>) -> Self {
        Output::Json(dir.into())
    }

    /// Create a CBOR file output writing into `dir`.
    #[cfg(feature = "minicbor")]
    pub fn cbor(dir: impl Into<PathBuf>) -> Self {
        Output::Cbor(dir.into())
    }

    /// Pick the output the driver flags ask for: JSON into `io_path` when
    /// `file_io` is set, otherwise the no-op output.
    pub fn from_flags(file_io: bool, io_path: impl Into<PathBuf>) -> Self {
        if file_io {
            Output::json(io_path)
        } else {
            Output::Null
        }
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Sending never blocks: when the buffer is full the report is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sparsewatch_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(4);
    /// assert!(rx.try_recv().is_err());
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<WindowReport>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Path the artifact for `report` would be written to, if any.
    pub fn artifact_path(&self, report: &WindowReport) -> Option<PathBuf> {
        match self {
            Output::Json(dir) => Some(artifact_path(dir, report, "json")),
            #[cfg(feature = "minicbor")]
            Output::Cbor(dir) => Some(artifact_path(dir, report, "cbor")),
            _ => None,
        }
    }
}

impl Render for Output {
    fn render(&mut self, report: &WindowReport) -> Result<Vec<PathBuf>, MonitorError> {
        match self {
            Output::Null => Ok(Vec::new()),
            Output::Json(dir) => {
                check_model_tag(&report.model)?;
                let bytes = serde_json::to_vec_pretty(report)?;
                let path = artifact_path(dir, report, "json");
                write_atomic(&path, &bytes)?;
                Ok(vec![path])
            }
            #[cfg(feature = "minicbor")]
            Output::Cbor(dir) => {
                check_model_tag(&report.model)?;
                let bytes = minicbor::to_vec(report)
                    .map_err(|e| MonitorError::ExportFailure(format!("CBOR encoding: {}", e)))?;
                let path = artifact_path(dir, report, "cbor");
                write_atomic(&path, &bytes)?;
                Ok(vec![path])
            }
            #[cfg(feature = "tokio")]
            Output::Channel(tx) => {
                use tokio::sync::mpsc::error::TrySendError;

                match tx.try_send(report.clone()) {
                    Ok(()) => Ok(Vec::new()),
                    // Best effort: a slow consumer loses windows, training does not wait.
                    Err(TrySendError::Full(_)) => {
                        debug!(
                            start = report.start_step,
                            end = report.end_step,
                            "report channel full, dropping window"
                        );
                        Ok(Vec::new())
                    }
                    Err(TrySendError::Closed(_)) => Err(MonitorError::ExportFailure(
                        "report channel closed".to_string(),
                    )),
                }
            }
        }
    }

    fn writes_files(&self) -> bool {
        match self {
            Output::Json(_) => true,
            #[cfg(feature = "minicbor")]
            Output::Cbor(_) => true,
            _ => false,
        }
    }
}

/// Whether `tag` can be used verbatim inside an artifact file name: not
/// empty, no path separators and no `..`.
pub fn is_file_safe_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag != "."
        && !tag.contains("..")
        && !tag.chars().any(|c| c == '/' || c == '\\' || std::path::is_separator(c))
}

fn check_model_tag(tag: &str) -> Result<(), MonitorError> {
    if is_file_safe_tag(tag) {
        Ok(())
    } else {
        Err(MonitorError::ExportFailure(format!(
            "model tag '{}' cannot be used in an artifact file name",
            tag
        )))
    }
}

/// `dir/{model}_sparsity_{start}-{end}.{ext}`
pub fn artifact_path(dir: &Path, report: &WindowReport, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", report.artifact_stem(), ext))
}

/// Write through a temporary sibling and rename, so readers polling the
/// directory never see a half-written artifact.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MonitorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsewatch_types::SparsityFrame;
    use std::collections::BTreeMap;

    fn report() -> WindowReport {
        let frames = vec![
            SparsityFrame::builder(0).tensor("conv1", |t| t.counts(1, 2)).build(),
            SparsityFrame::builder(10).tensor("conv1", |t| t.counts(2, 2)).build(),
        ];
        WindowReport::with_timestamp("resnet", frames, BTreeMap::new(), 1)
    }

    #[test]
    fn null_output_writes_nothing() {
        let mut output = Output::null();
        assert!(output.render(&report()).unwrap().is_empty());
        assert!(!output.writes_files());
        assert_eq!(output.artifact_path(&report()), None);
    }

    #[test]
    fn from_flags_respects_file_io() {
        assert!(matches!(Output::from_flags(false, "x"), Output::Null));
        assert!(matches!(Output::from_flags(true, "x"), Output::Json(_)));
    }

    #[test]
    fn json_output_names_artifact_from_model_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::json(dir.path().join("nested"));

        let written = output.render(&report()).unwrap();
        let expected = dir.path().join("nested").join("resnet_sparsity_0-10.json");
        assert_eq!(written, vec![expected.clone()]);
        assert!(output.writes_files());

        let parsed: WindowReport =
            serde_json::from_slice(&std::fs::read(&expected).unwrap()).unwrap();
        assert_eq!(parsed, report());
        assert!(!expected.with_extension("tmp").exists());
    }

    #[test]
    fn json_output_reports_unwritable_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot act as the artifact directory.
        let mut output = Output::json(file.path());
        let err = output.render(&report()).unwrap_err();
        assert!(matches!(err, MonitorError::ExportFailure(_)));
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn failed_rename_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory squatting on the artifact name blocks the rename.
        let blocker = dir.path().join("resnet_sparsity_0-10.json");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let mut output = Output::json(dir.path());
        let err = output.render(&report()).unwrap_err();
        assert!(matches!(err, MonitorError::ExportFailure(_)));
        assert!(!dir.path().join("resnet_sparsity_0-10.tmp").exists());
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn file_safe_tags() {
        assert!(is_file_safe_tag("resnet"));
        assert!(is_file_safe_tag("resnet-50.v2"));
        assert!(!is_file_safe_tag(""));
        assert!(!is_file_safe_tag("."));
        assert!(!is_file_safe_tag(".."));
        assert!(!is_file_safe_tag("../escape"));
        assert!(!is_file_safe_tag("runs/resnet"));
        assert!(!is_file_safe_tag("runs\\resnet"));
    }

    #[test]
    fn json_output_refuses_tag_that_leaves_directory() {
        let root = tempfile::tempdir().unwrap();
        let io_path = root.path().join("artifacts");
        let frames = vec![SparsityFrame::builder(0).tensor("conv1", |t| t.counts(1, 2)).build()];
        let report = WindowReport::with_timestamp("../escaped", frames, BTreeMap::new(), 1);

        let mut output = Output::json(&io_path);
        let err = output.render(&report).unwrap_err();
        assert!(matches!(err, MonitorError::ExportFailure(ref m) if m.contains("../escaped")));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn channel_output_delivers_reports() {
        let (mut output, mut rx) = Output::channel(1);
        output.render(&report()).unwrap();
        // Second send hits a full buffer and is dropped silently.
        output.render(&report()).unwrap();

        assert_eq!(rx.try_recv().unwrap().end_step, 10);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn channel_output_fails_when_receiver_dropped() {
        let (mut output, rx) = Output::channel(1);
        drop(rx);
        assert!(matches!(
            output.render(&report()),
            Err(MonitorError::ExportFailure(_))
        ));
    }

    #[cfg(feature = "minicbor")]
    #[test]
    fn cbor_output_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = Output::cbor(dir.path());
        let written = output.render(&report()).unwrap();
        let bytes = std::fs::read(&written[0]).unwrap();
        let parsed: WindowReport = minicbor::decode(&bytes).unwrap();
        assert_eq!(parsed, report());
    }
}
