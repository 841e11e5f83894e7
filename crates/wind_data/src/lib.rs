pub mod error;
pub mod grid;
pub mod provider;
pub mod readers;
pub mod record;

pub use error::ProviderError;
pub use provider::{ColumnLayout, DataProvider, ProviderConfig, ProviderStatus};
pub use record::{Batch, FeatureRecord};
