//! src/provider/config.rs
//!
//! Configuration for DataProvider behaviour.
//!
//! Example:
//! ```ignore
//! let config = ProviderConfig::builder()
//!     .group_size(10)
//!     .flush_threshold(1000)
//!     .shuffle_interval(Duration::from_secs(1))
//!     .seed(42)
//!     .build();
//! ```
//!
//! # Tuning notes:
//! - `flush_threshold`: larger chunks mean fewer lock acquisitions by the
//!   loaders but coarser visibility of newly loaded data to `get`.
//! - `poll_interval`: how long a blocked `get` sleeps between checks of the
//!   stop flag. Appends wake waiters immediately regardless of this value.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;

/// Which fields of a CSV row to read, counted from the end of the row
/// (1 = last field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub value_from_end: usize,
    pub hour_from_end: Option<usize>,
}

impl ColumnLayout {
    /// Forecast rows: `..., hour, model, wind`.
    pub const FEATURES: ColumnLayout = ColumnLayout {
        value_from_end: 1,
        hour_from_end: Some(3),
    };

    /// In-situ measurement rows: `..., wind`.
    pub const LABELS: ColumnLayout = ColumnLayout {
        value_from_end: 1,
        hour_from_end: None,
    };

    fn validate(&self, name: &str) -> Result<(), ProviderError> {
        if self.value_from_end == 0 || self.hour_from_end == Some(0) {
            return Err(ProviderError::InvalidConfig(format!(
                "{} column offsets count from 1 (the last field)",
                name
            )));
        }
        Ok(())
    }
}

/// Configuration for DataProvider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Columns read from the feature file. The hour column is required.
    pub feature_columns: ColumnLayout,
    /// Columns read from the label file.
    pub label_columns: ColumnLayout,
    /// Consecutive feature rows packed into one record (default 10)
    pub group_size: usize,
    /// Records a loader accumulates locally before appending under the lock (default 1000)
    pub flush_threshold: usize,
    /// Cadence of the background index shuffle (default 1s)
    pub shuffle_interval: Duration,
    /// How often a blocked `get` re-checks the stop flag (default 100ms)
    pub poll_interval: Duration,
    /// Seed for sampling and shuffling. A random seed is drawn when `None`.
    pub seed: Option<u64>,
    /// Fail `get` with `Misaligned` once loading finishes with unequal
    /// feature and label counts (default false: log a warning only)
    pub strict_alignment: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            feature_columns: ColumnLayout::FEATURES,
            label_columns: ColumnLayout::LABELS,
            group_size: 10,
            flush_threshold: 1000,
            shuffle_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            seed: None,
            strict_alignment: false,
        }
    }
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Fields per feature record: one per grouped row plus the hour.
    pub fn feature_width(&self) -> usize {
        self.group_size + 1
    }

    pub(crate) fn validate(&self) -> Result<(), ProviderError> {
        self.feature_columns.validate("feature")?;
        self.label_columns.validate("label")?;

        if self.feature_columns.hour_from_end.is_none() {
            return Err(ProviderError::InvalidConfig(
                "feature columns must include an hour field".to_string(),
            ));
        }
        if self.group_size == 0 {
            return Err(ProviderError::InvalidConfig(
                "group_size must be greater than 0".to_string(),
            ));
        }
        if self.flush_threshold == 0 {
            return Err(ProviderError::InvalidConfig(
                "flush_threshold must be greater than 0".to_string(),
            ));
        }
        if self.shuffle_interval.is_zero() || self.poll_interval.is_zero() {
            return Err(ProviderError::InvalidConfig(
                "shuffle_interval and poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ProviderConfig with method chaining
#[derive(Default)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn feature_columns(mut self, columns: ColumnLayout) -> Self {
        self.config.feature_columns = columns;
        self
    }

    pub fn label_columns(mut self, columns: ColumnLayout) -> Self {
        self.config.label_columns = columns;
        self
    }

    /// Set how many feature rows make up one record (must be > 0)
    pub fn group_size(mut self, size: usize) -> Self {
        self.config.group_size = size;
        self
    }

    /// Set the loader chunk size (must be > 0)
    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.config.flush_threshold = threshold;
        self
    }

    pub fn shuffle_interval(mut self, interval: Duration) -> Self {
        self.config.shuffle_interval = interval;
        self
    }

    /// Set the stop-flag polling interval for blocked `get` calls.
    ///
    /// - Too low: more wakeups while waiting on slow loaders.
    /// - Too high: slower response to `shutdown`.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the random seed for reproducible sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn strict_alignment(mut self, strict: bool) -> Self {
        self.config.strict_alignment = strict;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ProviderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_forecast_layout() {
        let config = ProviderConfig::default();
        assert_eq!(config.group_size, 10);
        assert_eq!(config.flush_threshold, 1000);
        assert_eq!(config.feature_width(), 11);
        assert_eq!(config.shuffle_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_sizes() {
        let config = ProviderConfig::builder().group_size(0).build();
        assert!(matches!(
            config.validate(),
            Err(ProviderError::InvalidConfig(_))
        ));

        let config = ProviderConfig::builder().flush_threshold(0).build();
        assert!(config.validate().is_err());

        let config = ProviderConfig::builder()
            .shuffle_interval(Duration::ZERO)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_offsets_and_missing_hour() {
        let config = ProviderConfig::builder()
            .label_columns(ColumnLayout {
                value_from_end: 0,
                hour_from_end: None,
            })
            .build();
        assert!(config.validate().is_err());

        let config = ProviderConfig::builder()
            .feature_columns(ColumnLayout::LABELS)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn column_layout_round_trips_through_json() -> anyhow::Result<()> {
        let json = serde_json::to_string(&ColumnLayout::FEATURES)?;
        let parsed: ColumnLayout = serde_json::from_str(&json)?;
        assert_eq!(parsed, ColumnLayout::FEATURES);
        Ok(())
    }
}
