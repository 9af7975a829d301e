//! SparsityFrame - the analysis of one monitored training step.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::{TensorSparsity, TensorSparsityBuilder};

/// Sparsity of every tensor fetched at one monitored step.
///
/// Frames are appended to the monitoring window in step order and are
/// the unit that gets replayed when an exported window is animated.
///
/// # Example
///
/// ```rust
/// use sparsewatch_types::SparsityFrame;
///
/// let frame = SparsityFrame::builder(40)
///     .tensor("block1/relu", |t| t.counts(30, 40))
///     .build();
///
/// assert_eq!(frame.step, 40);
/// assert_eq!(frame.mean_ratio(), Some(0.75));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct SparsityFrame {
    /// Training step this frame was sampled at.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub step: u64,

    /// Statistics keyed by tensor identifier.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub tensors: BTreeMap<String, TensorSparsity>,
}

impl SparsityFrame {
    /// Create an empty frame for a step.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            tensors: BTreeMap::new(),
        }
    }

    /// Create a builder for a step.
    pub fn builder(step: u64) -> SparsityFrameBuilder {
        SparsityFrameBuilder::new(step)
    }

    /// Check if the frame has no tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Number of tensors in the frame.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Statistics for a specific tensor.
    pub fn get(&self, tensor: &str) -> Option<&TensorSparsity> {
        self.tensors.get(tensor)
    }

    /// Iterate over all tensors in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TensorSparsity)> {
        self.tensors.iter()
    }

    /// Unweighted mean ratio across tensors, `None` for an empty frame.
    pub fn mean_ratio(&self) -> Option<f64> {
        if self.tensors.is_empty() {
            return None;
        }
        let sum: f64 = self.tensors.values().map(|t| t.ratio).sum();
        Some(sum / self.tensors.len() as f64)
    }

    /// Element-weighted ratio across tensors, `None` if no elements were seen.
    pub fn overall_ratio(&self) -> Option<f64> {
        let zeros: u64 = self.tensors.values().map(|t| t.zeros).sum();
        let total: u64 = self.tensors.values().map(|t| t.total).sum();
        if total == 0 {
            None
        } else {
            Some(zeros as f64 / total as f64)
        }
    }
}

/// Builder for constructing [`SparsityFrame`] instances.
#[derive(Debug)]
pub struct SparsityFrameBuilder {
    step: u64,
    tensors: BTreeMap<String, TensorSparsity>,
}

impl SparsityFrameBuilder {
    /// Create a new builder for a step.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            tensors: BTreeMap::new(),
        }
    }

    /// Add a tensor with statistics built using a closure.
    pub fn tensor<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(TensorSparsityBuilder) -> TensorSparsityBuilder,
    {
        let stats = f(TensorSparsityBuilder::new()).build();
        self.tensors.insert(name.into(), stats);
        self
    }

    /// Add a tensor with pre-computed statistics.
    pub fn tensor_stats(mut self, name: impl Into<String>, stats: TensorSparsity) -> Self {
        self.tensors.insert(name.into(), stats);
        self
    }

    /// Build the frame.
    pub fn build(self) -> SparsityFrame {
        SparsityFrame {
            step: self.step,
            tensors: self.tensors,
        }
    }
}
