//! Errors surfaced by the provider and its loaders.
//!
//! Most of the crate propagates `anyhow::Error` with context attached. The
//! variants here are the ones a caller is expected to match on, either
//! directly (from `DataProvider::get`) or through `downcast_ref` on an
//! `anyhow::Error` returned by a loader.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// A row lacks an expected trailing field or it does not parse as a number.
    #[error("malformed row at line {line}: {field} field {reason}")]
    MalformedRow {
        line: u64,
        field: &'static str,
        reason: String,
    },

    #[error("batch size must be greater than 0")]
    InvalidBatchSize,

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// Raised only by `get_timeout`; `get` keeps waiting instead.
    #[error("timed out waiting for {requested} samples ({available} available)")]
    Timeout { requested: usize, available: usize },

    /// Loading finished with different feature and label counts while
    /// strict alignment is enabled.
    #[error("feature buffer holds {features} records but label buffer holds {labels}")]
    Misaligned { features: usize, labels: usize },

    #[error("data provider has been shut down")]
    Stopped,
}
