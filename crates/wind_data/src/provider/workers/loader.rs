//! src/provider/workers/loader.rs
//!
//! Feature and label loaders.
//!
//! Each loader parses its file outside the lock, collects records into a
//! local chunk, and moves the whole chunk into its shared buffer once the
//! chunk reaches `flush_threshold` (and once more at end of file). The lock
//! is held only for the move.

use anyhow::{anyhow, Result};
use log::{debug, info};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::provider::config::ProviderConfig;
use crate::provider::state::{Buffer, Shared, SharedState};
use crate::readers::{CsvColumnSource, FieldRow};
use crate::record::FeatureRecord;

/// Packs every `group_size` consecutive rows into one [`FeatureRecord`].
///
/// The record holds each row's value in order, followed by the hour of the
/// group's last row divided by 24. Rows left over at the end of the input
/// are dropped; [`pending_rows`](Self::pending_rows) reports how many.
pub struct FeaturePacker<I> {
    rows: I,
    group_size: usize,
    pending: Vec<f32>,
}

impl<I> FeaturePacker<I> {
    pub fn new(rows: I, group_size: usize) -> Self {
        Self {
            rows,
            group_size,
            pending: Vec::with_capacity(group_size + 1),
        }
    }

    /// Rows consumed since the last complete group.
    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }
}

impl<I> Iterator for FeaturePacker<I>
where
    I: Iterator<Item = Result<FieldRow>>,
{
    type Item = Result<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            self.pending.push(row.value);

            if self.pending.len() >= self.group_size {
                let Some(hour) = row.hour else {
                    return Some(Err(anyhow!("feature rows must carry an hour field")));
                };
                let values = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.group_size + 1),
                );
                return Some(Ok(FeatureRecord::from_group(values, hour)));
            }
        }
    }
}

fn feature_buffer(state: &mut SharedState) -> &mut Buffer<FeatureRecord> {
    &mut state.features
}

fn label_buffer(state: &mut SharedState) -> &mut Buffer<f32> {
    &mut state.labels
}

/// Outcome of one loader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadSummary {
    pub(crate) appended: usize,
    pub(crate) interrupted: bool,
}

/// Moves `items` into the buffer selected by `buffer`, `flush_threshold` at a time.
///
/// Stops at the first error without flushing the partial chunk. When the
/// stop flag is raised the partial chunk is discarded and the run reports
/// itself as interrupted.
pub(crate) fn append_in_chunks<T, I>(
    items: I,
    shared: &Shared,
    flush_threshold: usize,
    shutdown: &AtomicBool,
    buffer: fn(&mut SharedState) -> &mut Buffer<T>,
) -> Result<LoadSummary>
where
    I: Iterator<Item = Result<T>>,
{
    let mut chunk = Vec::with_capacity(flush_threshold);
    let mut appended = 0;

    for item in items {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(LoadSummary {
                appended,
                interrupted: true,
            });
        }

        chunk.push(item?);
        if chunk.len() >= flush_threshold {
            appended += shared.update(|state| buffer(state).append(&mut chunk));
        }
    }

    if !chunk.is_empty() {
        appended += shared.update(|state| buffer(state).append(&mut chunk));
    }

    Ok(LoadSummary {
        appended,
        interrupted: false,
    })
}

pub(crate) fn run_feature_loader(
    source: &CsvColumnSource,
    config: &ProviderConfig,
    shared: &Shared,
    shutdown: &AtomicBool,
) -> Result<usize> {
    let mut records = FeaturePacker::new(source.stream()?, config.group_size);
    let summary = append_in_chunks(
        records.by_ref(),
        shared,
        config.flush_threshold,
        shutdown,
        feature_buffer,
    )?;

    if summary.interrupted {
        debug!(
            "feature loader stopped early after {} records",
            summary.appended
        );
    } else {
        if records.pending_rows() > 0 {
            debug!(
                "dropped {} trailing rows that do not fill a group of {}",
                records.pending_rows(),
                config.group_size
            );
        }
        info!(
            "feature loader done: {} records from {}",
            summary.appended,
            source.path().display()
        );
    }
    Ok(summary.appended)
}

pub(crate) fn run_label_loader(
    source: &CsvColumnSource,
    config: &ProviderConfig,
    shared: &Shared,
    shutdown: &AtomicBool,
) -> Result<usize> {
    let labels = source.stream()?.map(|row| row.map(|row| row.value));
    let summary = append_in_chunks(
        labels,
        shared,
        config.flush_threshold,
        shutdown,
        label_buffer,
    )?;

    if summary.interrupted {
        debug!("label loader stopped early after {} labels", summary.appended);
    } else {
        info!(
            "label loader done: {} labels from {}",
            summary.appended,
            source.path().display()
        );
    }
    Ok(summary.appended)
}

/// Reads every feature record of a file synchronously, the same way the
/// background feature loader does.
pub fn load_features(path: impl AsRef<Path>, config: &ProviderConfig) -> Result<Vec<FeatureRecord>> {
    let source = CsvColumnSource::new(path.as_ref(), config.feature_columns);
    FeaturePacker::new(source.stream()?, config.group_size).collect()
}

/// Reads every label of a file synchronously.
pub fn load_labels(path: impl AsRef<Path>, config: &ProviderConfig) -> Result<Vec<f32>> {
    let source = CsvColumnSource::new(path.as_ref(), config.label_columns);
    source.stream()?.map(|row| row.map(|row| row.value)).collect()
}
