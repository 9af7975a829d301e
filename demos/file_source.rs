//! Example: Following window artifacts on disk
//!
//! This example watches an artifact directory written by a training run
//! with `--file-io` and prints each new window as it appears.
//!
//! # Usage
//!
//! ```bash
//! sparsewatch train --file-io --io-path resnet_50Kiter --monitor-period 20 &
//! cargo run --example file_source -- resnet_50Kiter
//! ```

use std::env;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use sparsewatch::{FileSource, ReportSource};

fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example file_source -- <artifact-or-directory>");
        eprintln!();
        eprintln!("Artifacts are named {{model}}_sparsity_{{start}}-{{end}}.json");
        std::process::exit(1);
    });

    println!("Watching: {}", path);
    println!("Press Ctrl+C to stop\n");

    let mut source = FileSource::new(&path);

    loop {
        match source.poll() {
            Some(report) => {
                println!(
                    "Window {}-{} of {} ({} frames):",
                    report.start_step,
                    report.end_step,
                    report.model,
                    report.len()
                );
                for (name, trend) in &report.summary {
                    println!(
                        "  - {}: mean {:.3}, range {:.3}..{:.3}, slope {:+.2e}",
                        name, trend.mean, trend.min, trend.max, trend.slope
                    );
                }
                println!();
            }
            None => {
                if let Some(err) = source.error() {
                    eprint!("\rError: {}  ", err);
                } else {
                    print!("\rWaiting for a new window...  ");
                }
                let _ = io::stdout().flush();
            }
        }

        thread::sleep(Duration::from_secs(1));
    }
}
