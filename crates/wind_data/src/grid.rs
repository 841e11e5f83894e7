//! Gridded comparison of predicted and measured wind speed.
//!
//! Predictions and measurements cover `dates x hours` frames of a
//! `width x height` map. A [`WindGrid`] stores them row-major in
//! `(date, hour, x, y)` order so a single frame is one contiguous slice.
//!
//! Per frame the comparison reports how many cells are dangerous
//! (wind speed at or above a threshold) in each grid, how many dangerous
//! measured cells the prediction missed, and the total absolute error.

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dimensions of a wind grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub dates: usize,
    pub hours: usize,
    pub width: usize,
    pub height: usize,
}

impl Default for GridShape {
    fn default() -> Self {
        Self {
            dates: 5,
            hours: 18,
            width: 548,
            height: 421,
        }
    }
}

impl GridShape {
    pub fn frame_len(&self) -> usize {
        self.width * self.height
    }

    pub fn frames(&self) -> usize {
        self.dates * self.hours
    }

    pub fn len(&self) -> usize {
        self.frames() * self.frame_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn offset(&self, date: usize, hour: usize, x: usize, y: usize) -> usize {
        ((date * self.hours + hour) * self.width + x) * self.height + y
    }
}

/// How coordinate rows map onto a [`GridShape`].
///
/// Rows end with `x, y, date, hour, [model,] wind`. Ids in the file are
/// shifted by the bases below to become zero-based grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateLayout {
    pub has_model: bool,
    pub xy_base: i64,
    pub date_base: i64,
    pub hour_base: i64,
}

impl CoordinateLayout {
    /// Ensemble forecast rows: `xid, yid, date_id, hour, model, wind`.
    pub const FORECAST: CoordinateLayout = CoordinateLayout {
        has_model: true,
        xy_base: 1,
        date_base: 3,
        hour_base: 3,
    };

    /// Measurement rows: `xid, yid, date_id, hour, wind`.
    pub const MEASUREMENT: CoordinateLayout = CoordinateLayout {
        has_model: false,
        xy_base: 1,
        date_base: 3,
        hour_base: 3,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindGrid {
    shape: GridShape,
    values: Vec<f32>,
}

impl WindGrid {
    pub fn new(shape: GridShape, values: Vec<f32>) -> Result<Self> {
        ensure!(
            values.len() == shape.len(),
            "grid {:?} needs {} values, got {}",
            shape,
            shape.len(),
            values.len()
        );
        Ok(Self { shape, values })
    }

    /// Reads the named column of a CSV file and reshapes it into `shape`.
    pub fn from_column(path: impl AsRef<Path>, column: &str, shape: GridShape) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let column_idx = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| anyhow!("{} has no '{}' column", path.display(), column))?;

        let mut values = Vec::with_capacity(shape.len());
        for (row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("CSV row {}", row + 1))?;
            let raw = record
                .get(column_idx)
                .ok_or_else(|| anyhow!("CSV row {} has no '{}' field", row + 1, column))?;
            values.push(
                raw.parse::<f32>()
                    .with_context(|| format!("CSV row {}: '{}' is not a number", row + 1, raw))?,
            );
        }

        Self::new(shape, values).with_context(|| format!("Failed to reshape {}", path.display()))
    }

    /// Scatters coordinate-addressed rows into a grid.
    ///
    /// With `layout.has_model` every cell holds the mean over the models
    /// that reported it. Cells no row mentions stay at 0.
    pub fn from_coordinates(
        path: impl AsRef<Path>,
        layout: CoordinateLayout,
        shape: GridShape,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut sums = vec![0.0f64; shape.len()];
        let mut counts = vec![0u32; shape.len()];

        for record in reader.records() {
            let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
            let (offset, wind) = locate(&record, &layout, &shape)
                .with_context(|| format!("Invalid row in {}", path.display()))?;
            sums[offset] += f64::from(wind);
            counts[offset] += 1;
        }

        let values = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| if count == 0 { 0.0 } else { (sum / f64::from(count)) as f32 })
            .collect();
        Self::new(shape, values)
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The `width x height` slice for one date and hour.
    pub fn frame(&self, date: usize, hour: usize) -> Option<&[f32]> {
        if date >= self.shape.dates || hour >= self.shape.hours {
            return None;
        }
        let start = self.shape.offset(date, hour, 0, 0);
        Some(&self.values[start..start + self.shape.frame_len()])
    }
}

/// Parses the trailing coordinate fields of a row into a grid offset and value.
fn locate(record: &StringRecord, layout: &CoordinateLayout, shape: &GridShape) -> Result<(usize, f32)> {
    let trailing = if layout.has_model { 6 } else { 5 };
    ensure!(
        record.len() >= trailing,
        "line {}: expected at least {} fields, got {}",
        line_of(record),
        trailing,
        record.len()
    );
    let base = record.len() - trailing;

    let x = grid_index(record, base, layout.xy_base, shape.width, "x")?;
    let y = grid_index(record, base + 1, layout.xy_base, shape.height, "y")?;
    let date = grid_index(record, base + 2, layout.date_base, shape.dates, "date")?;
    let hour = grid_index(record, base + 3, layout.hour_base, shape.hours, "hour")?;
    let raw_wind = field(record, base + trailing - 1)?;
    let wind = raw_wind
        .parse::<f32>()
        .with_context(|| format!("line {}: wind '{}' is not a number", line_of(record), raw_wind))?;

    Ok((shape.offset(date, hour, x, y), wind))
}

fn field(record: &StringRecord, idx: usize) -> Result<&str> {
    record
        .get(idx)
        .ok_or_else(|| anyhow!("line {}: missing field {}", line_of(record), idx))
}

/// Reads an integer id and shifts it by `origin` into `0..limit`.
fn grid_index(record: &StringRecord, idx: usize, origin: i64, limit: usize, name: &str) -> Result<usize> {
    let raw = field(record, idx)?;
    let id: i64 = raw
        .parse()
        .with_context(|| format!("line {}: {} '{}' is not an integer", line_of(record), name, raw))?;
    match id.checked_sub(origin) {
        Some(shifted) if shifted >= 0 && (shifted as u64) < limit as u64 => Ok(shifted as usize),
        _ => bail!(
            "line {}: {} {} is outside 0..{} after subtracting {}",
            line_of(record),
            name,
            id,
            limit,
            origin
        ),
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Wind-speed thresholds used when comparing frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Cells at or above this speed are dangerous.
    pub danger: f32,
    /// A measured cell above this speed is missed when the prediction is below it.
    pub miss: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            danger: 1.0,
            miss: 0.7,
        }
    }
}

/// `true` for every cell at or above `threshold`.
pub fn threshold_mask(frame: &[f32], threshold: f32) -> Vec<bool> {
    frame.iter().map(|&v| v >= threshold).collect()
}

/// Three-level agreement map: `(1 + truth_danger - predicted_danger) * 10`.
///
/// 10 where both agree, 20 where only the measurement is dangerous (a miss),
/// 0 where only the prediction is dangerous (a false alarm).
pub fn agreement_map(predicted: &[f32], truth: &[f32], threshold: f32) -> Vec<u8> {
    predicted
        .iter()
        .zip(truth)
        .map(|(&p, &t)| {
            let level = 1 + i32::from(t >= threshold) - i32::from(p >= threshold);
            (level * 10) as u8
        })
        .collect()
}

/// Summary of one `(date, hour)` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub date: usize,
    pub hour: usize,
    pub predicted_dangerous: usize,
    pub measured_dangerous: usize,
    pub missed_cells: usize,
    pub abs_error_sum: f64,
}

pub fn compare_frame(predicted: &[f32], truth: &[f32], thresholds: Thresholds) -> FrameReport {
    let mut report = FrameReport {
        date: 0,
        hour: 0,
        predicted_dangerous: 0,
        measured_dangerous: 0,
        missed_cells: 0,
        abs_error_sum: 0.0,
    };
    for (&p, &t) in predicted.iter().zip(truth) {
        report.predicted_dangerous += usize::from(p >= thresholds.danger);
        report.measured_dangerous += usize::from(t >= thresholds.danger);
        report.missed_cells += usize::from(t > thresholds.miss && p < thresholds.miss);
        report.abs_error_sum += f64::from((t - p).abs());
    }
    report
}

/// Compares every frame of two grids of the same shape.
pub fn compare(predicted: &WindGrid, truth: &WindGrid, thresholds: Thresholds) -> Result<Vec<FrameReport>> {
    ensure!(
        predicted.shape() == truth.shape(),
        "prediction grid {:?} and measurement grid {:?} differ in shape",
        predicted.shape(),
        truth.shape()
    );

    let shape = predicted.shape();
    let mut reports = Vec::with_capacity(shape.frames());
    for date in 0..shape.dates {
        for hour in 0..shape.hours {
            let (Some(p), Some(t)) = (predicted.frame(date, hour), truth.frame(date, hour)) else {
                bail!("frame ({}, {}) out of range", date, hour);
            };
            reports.push(FrameReport {
                date,
                hour,
                ..compare_frame(p, t, thresholds)
            });
        }
    }
    Ok(reports)
}

/// Reads the `wind` column of a prediction file and a measurement file,
/// reshapes both into `shape` and compares them frame by frame.
///
/// Both files are taken in row order; their coordinate columns are not
/// interpreted.
pub fn compare_files(
    predictions: impl AsRef<Path>,
    truth: impl AsRef<Path>,
    shape: GridShape,
    thresholds: Thresholds,
) -> Result<Vec<FrameReport>> {
    let predicted = WindGrid::from_column(predictions, "wind", shape)?;
    let measured = WindGrid::from_column(truth, "wind", shape)?;
    compare(&predicted, &measured, thresholds)
}
