//! Records produced by the loaders and batches handed to consumers.

use anyhow::{ensure, Result};

/// Hours in a day; the hour field of a feature group is divided by this.
pub const HOURS_PER_DAY: f32 = 24.0;

/// One packed feature vector: the value field of each row of a group,
/// followed by the normalized hour of the group's last row.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    values: Box<[f32]>,
}

impl FeatureRecord {
    /// Builds a record from the per-row values and the raw hour-of-day of
    /// the last row in the group.
    pub fn from_group(mut values: Vec<f32>, hour: f32) -> Self {
        values.push(hour / HOURS_PER_DAY);
        Self {
            values: values.into_boxed_slice(),
        }
    }

    /// All fields, hour last.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Per-row values without the trailing hour field.
    pub fn values(&self) -> &[f32] {
        &self.values[..self.values.len() - 1]
    }

    /// Normalized hour-of-day (`hour / 24`).
    pub fn hour(&self) -> f32 {
        self.values[self.values.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fixed-size group of aligned feature records and labels returned by
/// one `DataProvider::get` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub features: Vec<FeatureRecord>,
    pub labels: Vec<f32>,
}

impl Batch {
    pub(crate) fn new(features: Vec<FeatureRecord>, labels: Vec<f32>) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        Self { features, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of fields per feature record, or 0 for an empty batch.
    pub fn feature_width(&self) -> usize {
        self.features.first().map(FeatureRecord::len).unwrap_or(0)
    }

    /// Flattens the features into a row-major `len() x feature_width()` matrix.
    ///
    /// Fails if the records do not all share the same width.
    pub fn feature_matrix(&self) -> Result<Vec<f32>> {
        let width = self.feature_width();
        let mut matrix = Vec::with_capacity(width * self.len());
        for (row, record) in self.features.iter().enumerate() {
            ensure!(
                record.len() == width,
                "record {} has {} fields, expected {}",
                row,
                record.len(),
                width
            );
            matrix.extend_from_slice(record.as_slice());
        }
        Ok(matrix)
    }

    /// Iterates `(features, label)` pairs in batch order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureRecord, f32)> {
        self.features.iter().zip(self.labels.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_normalizes_hour() {
        let record = FeatureRecord::from_group(vec![1.0, 2.0, 3.0], 12.0);
        assert_eq!(record.len(), 4);
        assert_eq!(record.values(), &[1.0, 2.0, 3.0]);
        assert!((record.hour() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn feature_matrix_is_row_major() -> Result<()> {
        let batch = Batch::new(
            vec![
                FeatureRecord::from_group(vec![1.0, 2.0], 0.0),
                FeatureRecord::from_group(vec![3.0, 4.0], 24.0),
            ],
            vec![10.0, 20.0],
        );
        assert_eq!(batch.feature_width(), 3);
        assert_eq!(batch.feature_matrix()?, vec![1.0, 2.0, 0.0, 3.0, 4.0, 1.0]);
        Ok(())
    }

    #[test]
    fn feature_matrix_rejects_ragged_records() {
        let batch = Batch::new(
            vec![
                FeatureRecord::from_group(vec![1.0, 2.0], 0.0),
                FeatureRecord::from_group(vec![3.0], 0.0),
            ],
            vec![0.0, 0.0],
        );
        assert!(batch.feature_matrix().is_err());
    }

    #[test]
    fn empty_batch_has_zero_width() {
        let batch = Batch::new(Vec::new(), Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.feature_width(), 0);
    }
}
