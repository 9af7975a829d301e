//! Example: Following a training run through a channel
//!
//! This example runs the synthetic training loop on a background thread
//! with a channel output attached to the sparsity monitor, and prints each
//! completed window from the receiving side.
//!
//! This is useful when you want to:
//! - Watch sparsity without writing artifacts
//! - Feed windows into your own dashboards or alerts
//!
//! # Usage
//!
//! ```bash
//! cargo run --example channel_source
//! ```

use std::thread;
use std::time::Duration;

use sparsewatch::train::{build_trainer, TrainSettings};
use sparsewatch::{ChannelSource, ReportSource, Thresholds, WindowData};
use sparsewatch_sdk::Output;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let settings = TrainSettings {
        max_steps: 600,
        log_frequency: 200,
        monitor_interval: 10,
        monitor_period: 15,
        tensors_per_step: Some(3),
        ..TrainSettings::default()
    };

    let (output, rx) = Output::channel(16);
    let mut source = ChannelSource::new(rx, "synthetic training");
    let mut trainer = build_trainer(&settings, Some(Box::new(output)))?;

    let handle = thread::spawn(move || trainer.run());

    let thresholds = Thresholds::default();
    loop {
        match source.poll() {
            Some(report) => {
                let data = WindowData::from_report(report, &thresholds);
                println!(
                    "Window {}-{}: {} tensors, {} flagged",
                    data.report.start_step,
                    data.report.end_step,
                    data.tensors.len(),
                    data.flagged().len()
                );
                for tensor in data.flagged() {
                    println!("  {} {} mean {:.3}", tensor.level.symbol(), tensor.name, tensor.trend.mean);
                }
            }
            None if source.error().is_some() => break,
            None => thread::sleep(Duration::from_millis(50)),
        }
    }

    let summary = handle
        .join()
        .map_err(|_| anyhow::anyhow!("training thread panicked"))??;
    println!("Ran {} steps in {:?}", summary.steps_run, summary.elapsed);
    Ok(())
}
