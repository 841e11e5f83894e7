//! Command-line driver for the wind data pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Pull 100 batches of 1024 and log a naive-forecast baseline per step
//! windcast stream --features forecast.csv --labels measurement.csv --steps 100
//!
//! # Compare a prediction grid against measurements, one JSON line per frame
//! windcast grid --predictions pred_train.csv --truth measurement.csv
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) to see loader progress.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use wind_data::grid::{self, GridShape, Thresholds};
use wind_data::{Batch, DataProvider, ProviderConfig};

#[derive(Parser, Debug)]
#[command(name = "windcast")]
#[command(about = "Background batch loading and grid comparison for wind forecasts")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream training batches from a forecast/measurement file pair
    Stream {
        /// Forecast CSV (one row per model and cell; grouped into records)
        #[arg(long)]
        features: PathBuf,

        /// Measurement CSV (one label per row)
        #[arg(long)]
        labels: PathBuf,

        #[arg(long, default_value_t = 1024)]
        batch_size: usize,

        /// Number of batches to draw
        #[arg(long, default_value_t = 100)]
        steps: usize,

        /// Rows packed into one feature record
        #[arg(long, default_value_t = 10)]
        group_size: usize,

        #[arg(long, default_value_t = 1000)]
        flush_threshold: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// Give up on a batch after this many seconds instead of waiting forever
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Reject batches when feature and label counts differ
        #[arg(long)]
        strict_alignment: bool,
    },

    /// Compare predicted and measured wind grids frame by frame
    Grid {
        /// CSV with a `wind` column in (date, hour, x, y) order
        #[arg(long)]
        predictions: PathBuf,

        /// Measurement CSV with a `wind` column in the same order
        #[arg(long)]
        truth: PathBuf,

        #[arg(long, default_value_t = 5)]
        dates: usize,

        #[arg(long, default_value_t = 18)]
        hours: usize,

        #[arg(long, default_value_t = 548)]
        width: usize,

        #[arg(long, default_value_t = 421)]
        height: usize,

        /// Wind speed at which a cell counts as dangerous
        #[arg(long, default_value_t = 1.0)]
        danger: f32,

        /// Threshold for counting missed cells
        #[arg(long, default_value_t = 0.7)]
        miss: f32,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Args::parse().command {
        Command::Stream {
            features,
            labels,
            batch_size,
            steps,
            group_size,
            flush_threshold,
            seed,
            timeout_secs,
            strict_alignment,
        } => {
            let mut builder = ProviderConfig::builder()
                .group_size(group_size)
                .flush_threshold(flush_threshold)
                .strict_alignment(strict_alignment);
            if let Some(seed) = seed {
                builder = builder.seed(seed);
            }
            let provider = DataProvider::with_config(features, labels, builder.build())?;
            let timeout = timeout_secs.map(Duration::from_secs);
            stream(&provider, batch_size, steps, timeout)
        }
        Command::Grid {
            predictions,
            truth,
            dates,
            hours,
            width,
            height,
            danger,
            miss,
        } => {
            let shape = GridShape {
                dates,
                hours,
                width,
                height,
            };
            compare_grids(predictions, truth, shape, Thresholds { danger, miss })
        }
    }
}

fn stream(
    provider: &DataProvider,
    batch_size: usize,
    steps: usize,
    timeout: Option<Duration>,
) -> Result<()> {
    for step in 0..steps {
        let batch = match timeout {
            Some(timeout) => provider.get_timeout(batch_size, timeout),
            None => provider.get(batch_size),
        }
        .with_context(|| format!("step {}: failed to draw a batch of {}", step, batch_size))?;

        let (label_mean, baseline_mse) = baseline_stats(&batch);
        info!(
            "step {}: label mean {:.4}, ensemble-mean baseline mse {:.4}",
            step, label_mean, baseline_mse
        );
    }

    let status = provider.status();
    info!(
        "done: {} feature records, {} labels, loading finished: {}",
        status.features, status.labels, status.load_finished
    );
    for failure in &status.failures {
        error!("{}", failure);
    }
    Ok(())
}

/// Mean label and the squared error of predicting each label with the mean
/// of its record's per-row values.
fn baseline_stats(batch: &Batch) -> (f32, f32) {
    if batch.is_empty() {
        return (0.0, 0.0);
    }
    let n = batch.len() as f32;
    let label_mean = batch.labels.iter().sum::<f32>() / n;
    let mse = batch
        .iter()
        .map(|(record, label)| {
            let values = record.values();
            let prediction = values.iter().sum::<f32>() / values.len().max(1) as f32;
            (prediction - label).powi(2)
        })
        .sum::<f32>()
        / n;
    (label_mean, mse)
}

fn compare_grids(
    predictions: PathBuf,
    truth: PathBuf,
    shape: GridShape,
    thresholds: Thresholds,
) -> Result<()> {
    let reports = grid::compare_files(&predictions, &truth, shape, thresholds)?;
    info!("read {} and {}", predictions.display(), truth.display());

    let mut stdout = std::io::stdout().lock();
    for report in reports {
        serde_json::to_writer(&mut stdout, &report)?;
        writeln!(stdout)?;
    }
    Ok(())
}
