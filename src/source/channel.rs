//! Channel-based report source.
//!
//! Receives window reports from a monitor running in the same process,
//! through the receiving half of `Output::channel`.

use tokio::sync::mpsc::{self, error::TryRecvError};

use sparsewatch_types::WindowReport;

use super::ReportSource;

/// A source that receives window reports via a channel.
///
/// Pair it with the channel output of a
/// [`SparsityMonitor`](sparsewatch_sdk::SparsityMonitor) to follow a live
/// training run. Reports are returned one per poll, oldest first.
///
/// # Example
///
/// ```
/// use sparsewatch::ChannelSource;
/// use sparsewatch_sdk::Output;
///
/// let (output, rx) = Output::channel(16);
/// let source = ChannelSource::new(rx, "live training");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<WindowReport>,
    description: String,
    disconnected: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of a report channel
    /// * `source_description` - Where reports come from (e.g., "live training")
    pub fn new(receiver: mpsc::Receiver<WindowReport>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            disconnected: false,
        }
    }

    /// Create a channel pair for sending reports to a ChannelSource.
    pub fn create(buffer: usize, source_description: &str) -> (mpsc::Sender<WindowReport>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx, source_description))
    }
}

impl ReportSource for ChannelSource {
    fn poll(&mut self) -> Option<WindowReport> {
        match self.receiver.try_recv() {
            Ok(report) => Some(report),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        if self.disconnected {
            Some("producer finished")
        } else {
            None
        }
    }
}
