//! Data models and processing for window reports.
//!
//! ## Submodules
//!
//! - [`window`]: Per-window display data ([`WindowData`], [`TensorRow`], [`SparsityLevel`])
//! - [`history`]: Cross-window history for sparklines and drift
//!
//! ## Data Flow
//!
//! ```text
//! WindowReport (JSON / CBOR / channel)
//!        │
//!        ▼
//! WindowData::from_report()
//!        │
//!        ├──▶ TensorRow (with sparsity level computed from Thresholds)
//!        │
//!        └──▶ History::record() (for sparklines)
//! ```

pub mod history;
pub mod window;

pub use history::History;
pub use window::{SparsityLevel, TensorRow, Thresholds, WindowData};
