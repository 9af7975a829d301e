//! End-to-end behaviour of the monitor as seen by a training loop.

use std::fs;

use ndarray::{ArrayD, IxDyn};
use proptest::prelude::*;
use sparsewatch_sdk::{
    sparsity_ratio, Aggregator, DataFormat, FetchResults, IngestOutcome, MonitorConfig,
    MonitorError, Output, SparsityMonitor, StepOutcome, WindowReport,
};

fn config(interval: u64, period: usize) -> MonitorConfig {
    MonitorConfig::builder()
        .interval(interval)
        .period(period)
        .candidates(["conv1/relu", "conv2/relu", "fc/relu"])
        .model("resnet")
        .build()
        .unwrap()
}

/// Fetch what the monitor asked for, shaped like a small NHWC network.
fn run_step(monitor: &mut SparsityMonitor, step: u64) -> StepOutcome {
    let ctx = monitor.before_step(step);
    let results: FetchResults = ctx
        .selected
        .iter()
        .map(|name| {
            let tensor = if name.starts_with("fc") {
                ArrayD::from_elem(IxDyn(&[4, 10]), 0.0)
            } else {
                ArrayD::from_elem(IxDyn(&[4, 8, 8, 16]), 1.0)
            };
            (name.clone(), tensor)
        })
        .collect();
    monitor.after_step(&results, step)
}

#[test]
fn interval_ten_period_three_exports_zero_to_twenty() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = SparsityMonitor::new(config(10, 3), Output::json(dir.path()));

    let monitored: Vec<u64> = (0..=25).filter(|&s| monitor.before_step(s).is_monitored()).collect();
    assert_eq!(monitored, vec![0, 10, 20]);

    let mut completed = None;
    for step in 0..=20 {
        if let StepOutcome::WindowCompleted {
            start_step,
            end_step,
            artifacts,
        } = run_step(&mut monitor, step)
        {
            completed = Some((step, start_step, end_step, artifacts));
        }
    }

    let (triggered_at, start, end, artifacts) = completed.expect("window completed");
    assert_eq!((triggered_at, start, end), (20, 0, 20));
    assert_eq!(monitor.pending(), 0);

    let expected = dir.path().join("resnet_sparsity_0-20.json");
    assert_eq!(artifacts, vec![expected.clone()]);
    let report: WindowReport = serde_json::from_slice(&fs::read(expected).unwrap()).unwrap();
    assert_eq!(report.len(), 3);
    assert_eq!(report.summary["fc/relu"].mean, 1.0);
    assert_eq!(report.summary["conv1/relu"].mean, 0.0);
    assert_eq!(report.series("conv2/relu"), vec![(0, 0.0), (10, 0.0), (20, 0.0)]);
}

#[test]
fn missing_key_is_a_violation_and_window_is_unchanged() {
    let mut agg = Aggregator::new(config(10, 3).into());
    let mut results = FetchResults::new();
    results.insert("conv1/relu".into(), ArrayD::zeros(IxDyn(&[1, 2, 2, 1])));
    results.insert("conv2/relu".into(), ArrayD::zeros(IxDyn(&[1, 2, 2, 1])));

    let err = agg.ingest(&results, 0).unwrap_err();
    assert!(matches!(err, MonitorError::DataContractViolation { step: 0, .. }));
    assert!(err.is_recoverable());
    assert_eq!(agg.pending(), 0);
}

#[test]
fn zero_interval_is_rejected_before_any_step() {
    let err = MonitorConfig::new(
        Default::default(),
        DataFormat::Nhwc,
        0,
        3,
        vec!["conv1".to_string()],
    )
    .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidConfig(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn zero_period_and_empty_candidates_are_rejected() {
    assert!(MonitorConfig::builder().period(0).candidate("a").build().is_err());
    assert!(MonitorConfig::builder().build().is_err());
}

#[test]
fn file_io_disabled_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let io_path = dir.path().join("resnet_50Kiter");
    let mut monitor = SparsityMonitor::from_flags(config(1, 2), false, &io_path);

    for step in 0..6 {
        run_step(&mut monitor, step);
    }

    assert_eq!(monitor.stats().windows_completed, 3);
    assert!(monitor.last_report().is_some());
    assert!(!io_path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn file_io_enabled_writes_one_artifact_per_window() {
    let dir = tempfile::tempdir().unwrap();
    let io_path = dir.path().join("resnet_50Kiter");
    let mut monitor = SparsityMonitor::from_flags(config(5, 2), true, &io_path);

    for step in 0..=35 {
        run_step(&mut monitor, step);
    }

    let mut names: Vec<String> = fs::read_dir(&io_path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "resnet_sparsity_0-5.json",
            "resnet_sparsity_10-15.json",
            "resnet_sparsity_20-25.json",
            "resnet_sparsity_30-35.json",
        ]
    );
}

#[test]
fn flat_all_zero_and_all_nonzero_tensors_have_exact_ratios() {
    let config = MonitorConfig::builder()
        .interval(1)
        .period(1)
        .candidates(["embedding"])
        .model("resnet")
        .build()
        .unwrap();
    let mut agg = Aggregator::new(config.into());

    for (step, tensor, expected) in [
        (0, ArrayD::<f32>::zeros(IxDyn(&[17])), 1.0),
        (1, ArrayD::<f32>::from_elem(IxDyn(&[17]), 3.5), 0.0),
    ] {
        let mut results = FetchResults::new();
        results.insert("embedding".to_string(), tensor);
        let outcome = agg.ingest(&results, step).unwrap();
        assert!(matches!(outcome, IngestOutcome::WindowCompleted { .. }));

        let report = agg.last_report().unwrap();
        let stats = report.frames[0].get("embedding").unwrap();
        assert_eq!(stats.ratio, expected);
        assert!(stats.mask.is_none());
    }
}

#[test]
fn partial_window_is_discarded_at_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = SparsityMonitor::new(config(1, 10), Output::json(dir.path()));
    for step in 0..7 {
        run_step(&mut monitor, step);
    }
    assert_eq!(monitor.pending(), 7);
    drop(monitor);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

proptest! {
    #[test]
    fn window_tracks_min_of_ingests_and_period(period in 1usize..12, k in 0usize..12) {
        let mut agg = Aggregator::new(config(1, period).into());
        let mut results = FetchResults::new();
        for name in ["conv1/relu", "conv2/relu", "fc/relu"] {
            results.insert(name.to_string(), ArrayD::zeros(IxDyn(&[1, 3])));
        }

        for step in 0..k.min(period) as u64 {
            let outcome = agg.ingest(&results, step).unwrap();
            if (step as usize) + 1 == period {
                prop_assert!(
                    matches!(outcome, IngestOutcome::WindowCompleted { .. }),
                    "export triggered exactly at the period boundary"
                );
                prop_assert_eq!(agg.pending(), 0);
            } else {
                prop_assert_eq!(agg.pending(), step as usize + 1);
            }
        }
        if k < period {
            prop_assert_eq!(agg.pending(), k);
        }
    }

    #[test]
    fn ratio_is_fraction_of_zeros(zeros in 0usize..64, nonzeros in 0usize..64) {
        prop_assume!(zeros + nonzeros > 0);
        let mut data = vec![0.0f32; zeros];
        data.extend(std::iter::repeat(2.0).take(nonzeros));
        let tensor = ArrayD::from_shape_vec(IxDyn(&[zeros + nonzeros]), data).unwrap();
        let ratio = sparsity_ratio(&tensor.view(), 0.0).unwrap();
        prop_assert!((0.0..=1.0).contains(&ratio));
        prop_assert!((ratio - zeros as f64 / (zeros + nonzeros) as f64).abs() < 1e-12);
    }
}
