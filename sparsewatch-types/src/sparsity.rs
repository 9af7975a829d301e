//! Per-tensor sparsity statistics.

use crate::SpatialMask;

/// Sparsity of a single fetched tensor at one monitored step.
///
/// `ratio` is always `zeros / total`; the builder keeps the two in sync.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct TensorSparsity {
    /// Number of near-zero elements.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub zeros: u64,

    /// Total number of elements inspected.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub total: u64,

    /// Fraction of near-zero elements in `[0, 1]`.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub ratio: f64,

    /// Reduced spatial pattern, present for rank-4 tensors when spatial
    /// tracking is enabled.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub mask: Option<SpatialMask>,
}

impl TensorSparsity {
    /// Create statistics from element counts, without a mask.
    ///
    /// A tensor with no elements has ratio `0.0`.
    pub fn from_counts(zeros: u64, total: u64) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            zeros as f64 / total as f64
        };
        Self {
            zeros,
            total,
            ratio,
            mask: None,
        }
    }

    /// Create a builder.
    pub fn builder() -> TensorSparsityBuilder {
        TensorSparsityBuilder::new()
    }

    /// Number of elements that are not near zero.
    pub fn active(&self) -> u64 {
        self.total.saturating_sub(self.zeros)
    }

    /// Whether a spatial mask was recorded.
    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }
}

/// Builder for [`TensorSparsity`].
#[derive(Debug, Default)]
pub struct TensorSparsityBuilder {
    zeros: u64,
    total: u64,
    mask: Option<SpatialMask>,
}

impl TensorSparsityBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the near-zero and total element counts.
    pub fn counts(mut self, zeros: u64, total: u64) -> Self {
        self.zeros = zeros;
        self.total = total;
        self
    }

    /// Attach a spatial mask.
    pub fn mask(mut self, mask: SpatialMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Build the statistics.
    pub fn build(self) -> TensorSparsity {
        TensorSparsity {
            mask: self.mask,
            ..TensorSparsity::from_counts(self.zeros, self.total)
        }
    }
}
