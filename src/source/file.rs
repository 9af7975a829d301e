//! File-based report source.
//!
//! Watches either a single artifact or a directory of artifacts written by
//! a file output. For a directory the most recently modified artifact wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use sparsewatch_types::WindowReport;

use super::ReportSource;

/// Read a window report artifact, choosing the decoder by extension.
pub fn load_report(path: &Path) -> Result<WindowReport> {
    let bytes = fs::read(path).with_context(|| format!("Read error: {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("cbor") => decode_cbor(&bytes),
        _ => serde_json::from_slice(&bytes).context("Parse error"),
    }
}

#[cfg(feature = "minicbor")]
fn decode_cbor(bytes: &[u8]) -> Result<WindowReport> {
    minicbor::decode(bytes).map_err(|e| anyhow::anyhow!("Parse error: {}", e))
}

#[cfg(not(feature = "minicbor"))]
fn decode_cbor(_bytes: &[u8]) -> Result<WindowReport> {
    bail!("Parse error: CBOR artifacts need the `minicbor` feature")
}

fn is_artifact(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("cbor")
    )
}

/// A source that reads window reports from exported artifacts.
///
/// The source tracks modification times and only returns a report when the
/// watched artifact is newer than the last one returned.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    /// Create a new file source for an artifact or artifact directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    /// Returns the path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The artifact to read and its modification time.
    fn latest(&self) -> Result<(PathBuf, SystemTime)> {
        let meta = fs::metadata(&self.path)
            .with_context(|| format!("Read error: {}", self.path.display()))?;

        if !meta.is_dir() {
            return Ok((self.path.clone(), meta.modified()?));
        }

        let mut newest: Option<(PathBuf, SystemTime)> = None;
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if !is_artifact(&path) {
                continue;
            }
            let modified = fs::metadata(&path)?.modified()?;
            let newer = match &newest {
                None => true,
                // Ties go to the later window name, which sorts by start step.
                Some((best, t)) => modified > *t || (modified == *t && path > *best),
            };
            if newer {
                newest = Some((path, modified));
            }
        }
        match newest {
            Some(found) => Ok(found),
            None => bail!("Read error: no artifacts in {}", self.path.display()),
        }
    }
}

impl ReportSource for FileSource {
    fn poll(&mut self) -> Option<WindowReport> {
        let (path, modified) = match self.latest() {
            Ok(found) => found,
            Err(e) => {
                self.last_error = Some(format!("{:#}", e));
                return None;
            }
        };

        let changed = match self.last_modified {
            None => true,
            Some(last) => modified > last,
        };
        if !changed {
            return None;
        }

        match load_report(&path) {
            Ok(report) => {
                self.last_error = None;
                self.last_modified = Some(modified);
                Some(report)
            }
            Err(e) => {
                self.last_error = Some(format!("{:#}", e));
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsewatch_types::SparsityFrame;
    use std::collections::BTreeMap;

    fn report(start: u64, end: u64) -> WindowReport {
        let frames = vec![
            SparsityFrame::builder(start).tensor("conv1", |t| t.counts(1, 4)).build(),
            SparsityFrame::builder(end).tensor("conv1", |t| t.counts(2, 4)).build(),
        ];
        WindowReport::with_timestamp("resnet", frames, BTreeMap::new(), 0)
    }

    fn write(path: &Path, report: &WindowReport) {
        fs::write(path, serde_json::to_vec(report).unwrap()).unwrap();
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/resnet_sparsity_0-10.json");
        assert_eq!(source.path(), Path::new("/tmp/resnet_sparsity_0-10.json"));
        assert_eq!(source.description(), "file: /tmp/resnet_sparsity_0-10.json");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_reads_artifact_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resnet_sparsity_0-10.json");
        write(&path, &report(0, 10));

        let mut source = FileSource::new(&path);
        let first = source.poll().unwrap();
        assert_eq!(first.end_step, 10);
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_picks_newest_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("resnet_sparsity_0-10.json"), &report(0, 10));
        std::thread::sleep(std::time::Duration::from_millis(20));
        write(&dir.path().join("resnet_sparsity_20-30.json"), &report(20, 30));
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = FileSource::new(dir.path());
        assert_eq!(source.poll().unwrap().start_step, 20);
    }

    #[test]
    fn test_file_source_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(dir.path());
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("no artifacts"));
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/report.json");
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_file_source_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"not valid json").unwrap();

        let mut source = FileSource::new(&path);
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
