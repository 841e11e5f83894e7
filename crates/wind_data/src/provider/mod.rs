//! src/provider/mod.rs
//!
//! This module implements the `DataProvider`.
//!
//! The `DataProvider` loads a feature CSV and a label CSV in the background
//! and serves randomly sampled, position-aligned batches from whatever has
//! been loaded so far.
//!
//! # Architecture Overview
//!
//! ```text
//!   feature.csv              label.csv
//!        │                       │
//!        ↓                       ↓
//!  ┌───────────────┐      ┌──────────────┐
//!  │ feature-loader│      │ label-loader │   parse outside the lock,
//!  └──────┬────────┘      └──────┬───────┘   append 1000 at a time
//!         │                      │
//!         ↓                      ↓
//!  ┌─────────────────────────────────────┐
//!  │ Shared (one Mutex + Condvar)        │ ←── index-shuffler (every 1s)
//!  │  features | labels | index | flags  │
//!  └──────────────────┬──────────────────┘ ←── load-watcher (joins loaders,
//!                     │                          finalizes index)
//!                     ↓
//!              get(batch_size)  (blocks until enough aligned pairs)
//!                     │
//!                     ↓
//!                ┌─────────┐
//!                │  Batch  │ (features[i] pairs with labels[i])
//!                └─────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/provider/
//! ├── mod.rs             # Public API exports + architecture docs
//! ├── config.rs          # ProviderConfig, builder, ColumnLayout
//! ├── data_provider.rs   # DataProvider construction, get, shutdown
//! ├── state.rs           # Shared guarded state and sampling
//! └── workers/
//!     ├── mod.rs         # Thread spawning helper
//!     ├── loader.rs      # Feature/label loaders, FeaturePacker
//!     ├── shuffle.rs     # Periodic index shuffle
//!     └── watcher.rs     # Loader completion and finalization
//! ```
//!
//! # Example Usage
//! ```ignore
//! let provider = DataProvider::new("forecast.csv", "measurement.csv")?;
//! loop {
//!     let batch = provider.get(1024)?;
//!     let inputs = batch.feature_matrix()?;
//!     // train on (inputs, batch.labels)
//! }
//! ```
//!
//! ## Notes:
//! - Sampling draws distinct positions within one batch; separate calls are
//!   independent and may overlap.
//! - While loading is in progress every `get` rebuilds the index over the
//!   current data before shuffling, so the background shuffle only matters
//!   once loading has finished.
//! - Feature and label files must list rows in the same order; a length
//!   mismatch is logged and optionally rejected (`strict_alignment`).

mod config;
mod data_provider;
mod state;
mod workers;

pub use config::{ColumnLayout, ProviderConfig, ProviderConfigBuilder};
pub use data_provider::{DataProvider, ProviderStatus};
pub use workers::loader::{load_features, load_labels, FeaturePacker};
