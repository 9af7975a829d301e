//! # sparsewatch-types
//!
//! Core types for activation sparsity monitoring. This crate defines the schema
//! shared by the monitoring SDK (which produces frames and window reports during
//! training) and by any tool that consumes the exported artifacts.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **Layout aware**: Tensors are interpreted through an explicit [`DataFormat`]
//! - **Versioned schema**: Reports include version info for forward compatibility
//! - **Ergonomic builders**: Fluent API for constructing frames
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use sparsewatch_types::{SparsityFrame, SpatialMask};
//!
//! let frame = SparsityFrame::builder(120)
//!     .tensor("conv1/relu", |t| {
//!         t.counts(640, 1024)
//!          .mask(SpatialMask::from_cells(2, 2, vec![true, false, false, true]))
//!     })
//!     .tensor("fc1/relu", |t| t.counts(50, 200))
//!     .build();
//!
//! assert_eq!(frame.len(), 2);
//! assert_eq!(frame.get("fc1/relu").unwrap().ratio, 0.25);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. The version is included in serialized
//! window reports to allow consumers to handle format evolution gracefully.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod format;
mod frame;
mod mask;
mod report;
mod sparsity;
mod version;

pub use format::*;
pub use frame::*;
pub use mask::*;
pub use report::*;
pub use sparsity::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the report format.
/// Consumers should check this version and handle older formats appropriately.
pub const SCHEMA_VERSION: u32 = 1;
