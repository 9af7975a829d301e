//! Sparsity analysis of fetched activation tensors.
//!
//! An element is near zero when `|x| <= threshold`. With the default
//! threshold of `0.0` only exact zeros count, which is what ReLU emits.
//! NaN is never near zero.

use ndarray::{ArrayViewD, Axis, Ix3};
use sparsewatch_types::{DataFormat, SpatialMask, TensorSparsity};

use crate::error::MonitorError;

/// Whether a single value counts as zero under `threshold`.
#[inline]
pub fn is_near_zero(value: f32, threshold: f32) -> bool {
    value.abs() <= threshold
}

/// Count near-zero elements.
pub fn near_zero_count(tensor: &ArrayViewD<'_, f32>, threshold: f32) -> u64 {
    tensor.iter().filter(|&&x| is_near_zero(x, threshold)).count() as u64
}

/// Fraction of near-zero elements, `None` for a tensor with no elements.
pub fn sparsity_ratio(tensor: &ArrayViewD<'_, f32>, threshold: f32) -> Option<f64> {
    if tensor.is_empty() {
        return None;
    }
    Some(near_zero_count(tensor, threshold) as f64 / tensor.len() as f64)
}

/// Reduce a rank-4 tensor to a spatial mask.
///
/// Only batch element 0 is inspected; cell `(h, w)` is `true` when every
/// channel at that location is near zero. Errors name the offending
/// shape but carry step 0; callers attach the real step.
pub fn spatial_mask(
    tensor: &ArrayViewD<'_, f32>,
    format: DataFormat,
    threshold: f32,
) -> Result<SpatialMask, MonitorError> {
    if tensor.ndim() != 4 {
        return Err(MonitorError::violation(
            0,
            format!("spatial mask needs a rank-4 tensor, got shape {:?}", tensor.shape()),
        ));
    }
    if tensor.len_of(Axis(0)) == 0 {
        return Err(MonitorError::violation(0, "tensor has an empty batch"));
    }

    // Drop the batch axis, then bring the layout to (H, W, C).
    let (h_axis, w_axis) = format.spatial_axes();
    let c_axis = format.channel_axis();
    let sample = tensor
        .index_axis(Axis(0), 0)
        .permuted_axes(vec![h_axis - 1, w_axis - 1, c_axis - 1]);
    let sample = sample
        .into_dimensionality::<Ix3>()
        .map_err(|e| MonitorError::violation(0, format!("cannot reshape sample: {}", e)))?;

    let (height, width, _) = sample.dim();
    let height = u32::try_from(height)
        .map_err(|_| MonitorError::violation(0, "spatial height exceeds u32"))?;
    let width = u32::try_from(width)
        .map_err(|_| MonitorError::violation(0, "spatial width exceeds u32"))?;

    let cells = sample
        .outer_iter()
        .flat_map(|row| {
            row.outer_iter()
                .map(|channels| channels.iter().all(|&x| is_near_zero(x, threshold)))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(SpatialMask::from_cells(height, width, cells))
}

/// Settings applied to every tensor of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analyzer {
    /// Layout of rank-4 tensors.
    pub data_format: DataFormat,
    /// Near-zero threshold.
    pub zero_threshold: f32,
    /// Whether to compute spatial masks for rank-4 tensors.
    pub track_spatial: bool,
}

impl Analyzer {
    /// Analyze one tensor fetched at `step`.
    ///
    /// Rank-4 tensors are read according to the data format and get a
    /// spatial mask when tracking is on. Tensors of any other rank (dense
    /// layers, flat vectors) are counted but get no mask. An empty tensor
    /// violates the data contract.
    pub fn analyze(
        &self,
        name: &str,
        tensor: &ArrayViewD<'_, f32>,
        step: u64,
    ) -> Result<TensorSparsity, MonitorError> {
        let rank = tensor.ndim();
        if tensor.is_empty() {
            return Err(MonitorError::violation(
                step,
                format!("tensor '{}' has no elements (shape {:?})", name, tensor.shape()),
            ));
        }

        let zeros = near_zero_count(tensor, self.zero_threshold);
        let mut stats = TensorSparsity::from_counts(zeros, tensor.len() as u64);

        if self.track_spatial && rank == 4 {
            let mask = spatial_mask(tensor, self.data_format, self.zero_threshold).map_err(
                |err| match err {
                    MonitorError::DataContractViolation { reason, .. } => MonitorError::violation(
                        step,
                        format!("tensor '{}': {}", name, reason),
                    ),
                    other => other,
                },
            )?;
            stats.mask = Some(mask);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, ArrayD, IxDyn};

    fn analyzer(format: DataFormat) -> Analyzer {
        Analyzer {
            data_format: format,
            zero_threshold: 0.0,
            track_spatial: true,
        }
    }

    #[test]
    fn all_zero_tensor_is_fully_sparse() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[128]));
        assert_eq!(sparsity_ratio(&t.view(), 0.0), Some(1.0));
    }

    #[test]
    fn all_nonzero_tensor_is_dense() {
        let t = ArrayD::<f32>::from_elem(IxDyn(&[64]), 0.5);
        assert_eq!(sparsity_ratio(&t.view(), 0.0), Some(0.0));
    }

    #[test]
    fn empty_tensor_has_no_ratio() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[0]));
        assert_eq!(sparsity_ratio(&t.view(), 0.0), None);
    }

    #[test]
    fn threshold_is_inclusive_and_symmetric() {
        let t = Array::from_vec(vec![0.0f32, 1e-7, -1e-7, 1e-3, f32::NAN])
            .into_dyn();
        assert_eq!(near_zero_count(&t.view(), 0.0), 1);
        assert_eq!(near_zero_count(&t.view(), 1e-7), 3);
        assert_eq!(near_zero_count(&t.view(), 1.0), 4);
    }

    #[test]
    fn nhwc_mask_reduces_over_channels() {
        // batch 2, 2x2 spatial, 2 channels
        let mut t = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 2, 2]));
        t[[0, 0, 1, 1]] = 1.0; // (0,1) active through channel 1
        t[[0, 1, 0, 0]] = 2.0; // (1,0) active through channel 0
        t[[1, 1, 1, 0]] = 3.0; // batch 1 is ignored

        let mask = spatial_mask(&t.view(), DataFormat::Nhwc, 0.0).unwrap();
        assert_eq!((mask.height, mask.width), (2, 2));
        assert_eq!(mask.cells, vec![true, false, false, true]);
    }

    #[test]
    fn nchw_mask_matches_nhwc_layout() {
        // Same activations as above, stored channel-first.
        let mut t = ArrayD::<f32>::zeros(IxDyn(&[1, 2, 2, 3]));
        t[[0, 1, 0, 2]] = 1.0; // channel 1 at (0,2)
        t[[0, 0, 1, 0]] = 1.0; // channel 0 at (1,0)

        let mask = spatial_mask(&t.view(), DataFormat::Nchw, 0.0).unwrap();
        assert_eq!((mask.height, mask.width), (2, 3));
        assert_eq!(mask.cells, vec![true, true, false, false, true, true]);
    }

    #[test]
    fn mask_rejects_wrong_rank() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        assert!(matches!(
            spatial_mask(&t.view(), DataFormat::Nhwc, 0.0),
            Err(MonitorError::DataContractViolation { .. })
        ));
    }

    #[test]
    fn analyze_dense_tensor_has_no_mask() {
        let t = Array::from_shape_vec((2, 2), vec![0.0f32, 1.0, 0.0, 0.0])
            .unwrap()
            .into_dyn();
        let stats = analyzer(DataFormat::Nhwc).analyze("fc", &t.view(), 5).unwrap();
        assert_eq!(stats.zeros, 3);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.ratio, 0.75);
        assert!(stats.mask.is_none());
    }

    #[test]
    fn analyze_conv_tensor_has_mask() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 3, 4]));
        let stats = analyzer(DataFormat::Nhwc).analyze("conv", &t.view(), 5).unwrap();
        assert_eq!(stats.ratio, 1.0);
        let mask = stats.mask.unwrap();
        assert_eq!(mask.zero_fraction(), 1.0);
    }

    #[test]
    fn analyze_without_spatial_tracking_skips_mask() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 3, 4]));
        let a = Analyzer {
            track_spatial: false,
            ..analyzer(DataFormat::Nhwc)
        };
        assert!(a.analyze("conv", &t.view(), 0).unwrap().mask.is_none());
    }

    #[test]
    fn analyze_flat_tensor_is_ratio_only() {
        let zeros = ArrayD::<f32>::zeros(IxDyn(&[8]));
        let stats = analyzer(DataFormat::Nhwc).analyze("flat", &zeros.view(), 0).unwrap();
        assert_eq!(stats.ratio, 1.0);
        assert!(stats.mask.is_none());

        let ones = ArrayD::<f32>::ones(IxDyn(&[8]));
        let stats = analyzer(DataFormat::Nchw).analyze("flat", &ones.view(), 0).unwrap();
        assert_eq!(stats.ratio, 0.0);
    }

    #[test]
    fn analyze_rank3_tensor_is_ratio_only() {
        let mut t = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 2]));
        t[[0, 0, 0]] = 1.0;
        let stats = analyzer(DataFormat::Nhwc).analyze("seq", &t.view(), 40).unwrap();
        assert_eq!((stats.zeros, stats.total), (7, 8));
        assert!(stats.mask.is_none());
    }

    #[test]
    fn empty_tensor_error_carries_step_and_name() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[0]));
        let err = analyzer(DataFormat::Nhwc).analyze("odd", &t.view(), 40).unwrap_err();
        match err {
            MonitorError::DataContractViolation { step, reason } => {
                assert_eq!(step, 40);
                assert!(reason.contains("odd"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn analyze_rejects_empty_tensor() {
        let t = ArrayD::<f32>::zeros(IxDyn(&[0, 4]));
        assert!(analyzer(DataFormat::Nhwc).analyze("e", &t.view(), 0).is_err());
    }

    #[test]
    fn analyze_rejects_empty_batch_with_step() {
        // A zero batch means no elements, so the element check fires first.
        let t = ArrayD::<f32>::zeros(IxDyn(&[0, 2, 2, 2]));
        let err = analyzer(DataFormat::Nchw).analyze("c", &t.view(), 7).unwrap_err();
        assert!(matches!(err, MonitorError::DataContractViolation { step: 7, .. }));
    }
}
