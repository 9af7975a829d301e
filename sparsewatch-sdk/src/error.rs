//! Error types for the monitor.

use thiserror::Error;

/// Errors raised by the sparsity monitor.
///
/// Only [`MonitorError::InvalidConfig`] is fatal, and only at construction.
/// The other variants are reported by the aggregator and turned into a
/// skipped monitoring action by [`SparsityMonitor`](crate::SparsityMonitor).
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration rejected at construction time.
    #[error("Invalid monitor configuration: {0}")]
    InvalidConfig(String),

    /// Fetched values do not match what was scheduled for the step.
    #[error("Data contract violation at step {step}: {reason}")]
    DataContractViolation {
        /// Step the offending values were delivered for.
        step: u64,
        /// What did not match.
        reason: String,
    },

    /// Persisting or emitting a window artifact failed.
    #[error("Export failed: {0}")]
    ExportFailure(String),
}

impl MonitorError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        MonitorError::InvalidConfig(reason.into())
    }

    pub(crate) fn violation(step: u64, reason: impl Into<String>) -> Self {
        MonitorError::DataContractViolation {
            step,
            reason: reason.into(),
        }
    }

    /// Whether monitoring can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MonitorError::InvalidConfig(_))
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::ExportFailure(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::ExportFailure(format!("JSON encoding: {}", err))
    }
}
