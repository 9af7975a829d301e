//! Cross-frame summaries computed when a window completes.

use std::collections::BTreeMap;

use sparsewatch_types::{SparsityFrame, TensorTrend};

/// Summarize every tensor that appears in `frames`.
///
/// Tensors missing from some frames (round-robin selection) are summarized
/// over the frames they appear in.
pub fn summarize(frames: &[SparsityFrame]) -> BTreeMap<String, TensorTrend> {
    let mut names: Vec<&String> = frames.iter().flat_map(|f| f.tensors.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| trend(frames, name).map(|t| (name.clone(), t)))
        .collect()
}

/// Trend of a single tensor, `None` if it never appears.
pub fn trend(frames: &[SparsityFrame], tensor: &str) -> Option<TensorTrend> {
    let samples: Vec<(u64, f64)> = frames
        .iter()
        .filter_map(|f| f.get(tensor).map(|t| (f.step, t.ratio)))
        .collect();
    let (&(_, first), &(_, last)) = (samples.first()?, samples.last()?);

    let n = samples.len() as f64;
    let mean = samples.iter().map(|(_, r)| r).sum::<f64>() / n;
    let min = samples.iter().map(|(_, r)| *r).fold(f64::INFINITY, f64::min);
    let max = samples.iter().map(|(_, r)| *r).fold(f64::NEG_INFINITY, f64::max);

    Some(TensorTrend {
        samples: samples.len() as u32,
        mean,
        min,
        max,
        first,
        last,
        slope: slope(&samples),
        mask_churn: mask_churn(frames, tensor),
    })
}

/// Least-squares slope of ratio against step; `0.0` with fewer than two
/// distinct steps.
fn slope(samples: &[(u64, f64)]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|(s, _)| *s as f64).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, r)| r).sum::<f64>() / n;

    let (cov, var) = samples.iter().fold((0.0, 0.0), |(cov, var), (s, r)| {
        let dx = *s as f64 - mean_x;
        (cov + dx * (r - mean_y), var + dx * dx)
    });

    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}

/// Mean fraction of mask cells that flip between consecutive samples of
/// the tensor. `None` when there is no comparable pair of masks.
fn mask_churn(frames: &[SparsityFrame], tensor: &str) -> Option<f64> {
    let masks: Vec<_> = frames
        .iter()
        .filter_map(|f| f.get(tensor).and_then(|t| t.mask.as_ref()))
        .collect();

    let diffs: Vec<f64> = masks
        .windows(2)
        .filter_map(|pair| pair[0].diff_fraction(pair[1]))
        .collect();

    if diffs.is_empty() {
        None
    } else {
        Some(diffs.iter().sum::<f64>() / diffs.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsewatch_types::SpatialMask;

    fn frame(step: u64, zeros: u64, mask: Option<Vec<bool>>) -> SparsityFrame {
        SparsityFrame::builder(step)
            .tensor("conv", |t| {
                let t = t.counts(zeros, 4);
                match mask {
                    Some(cells) => t.mask(SpatialMask::from_cells(2, 2, cells)),
                    None => t,
                }
            })
            .build()
    }

    #[test]
    fn trend_tracks_extremes_and_mean() {
        let frames = vec![frame(0, 1, None), frame(10, 3, None), frame(20, 2, None)];
        let t = trend(&frames, "conv").unwrap();
        assert_eq!(t.samples, 3);
        assert_eq!(t.first, 0.25);
        assert_eq!(t.last, 0.5);
        assert_eq!(t.min, 0.25);
        assert_eq!(t.max, 0.75);
        assert!((t.mean - 0.5).abs() < 1e-12);
        assert_eq!(t.mask_churn, None);
    }

    #[test]
    fn slope_is_per_step() {
        let frames = vec![frame(0, 0, None), frame(100, 2, None), frame(200, 4, None)];
        let t = trend(&frames, "conv").unwrap();
        assert!((t.slope - 0.005).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_flat_slope() {
        let t = trend(&[frame(7, 2, None)], "conv").unwrap();
        assert_eq!(t.slope, 0.0);
        assert_eq!(t.samples, 1);
    }

    #[test]
    fn churn_averages_mask_flips() {
        let frames = vec![
            frame(0, 1, Some(vec![true, false, false, false])),
            frame(1, 1, Some(vec![false, false, false, false])),
            frame(2, 1, Some(vec![false, true, true, false])),
        ];
        let t = trend(&frames, "conv").unwrap();
        // 1/4 then 2/4 cells changed.
        assert!((t.mask_churn.unwrap() - 0.375).abs() < 1e-12);
    }

    #[test]
    fn summarize_covers_partially_sampled_tensors() {
        let frames = vec![
            SparsityFrame::builder(0).tensor("a", |t| t.counts(1, 2)).build(),
            SparsityFrame::builder(1).tensor("b", |t| t.counts(2, 2)).build(),
            SparsityFrame::builder(2).tensor("a", |t| t.counts(0, 2)).build(),
        ];
        let summary = summarize(&frames);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["a"].samples, 2);
        assert_eq!(summary["b"].samples, 1);
        assert_eq!(summary["b"].mean, 1.0);
    }

    #[test]
    fn empty_window_has_empty_summary() {
        assert!(summarize(&[]).is_empty());
        assert!(trend(&[], "conv").is_none());
    }
}
