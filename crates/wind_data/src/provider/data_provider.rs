//! src/provider/data_provider.rs
//!
//! The `DataProvider` struct: construction, batch retrieval and shutdown.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::config::ProviderConfig;
use super::state::Shared;
use super::workers::loader::{run_feature_loader, run_label_loader};
use super::workers::shuffle::run_shuffle_worker;
use super::workers::spawn_named;
use super::workers::watcher::{run_watcher, LoaderHandle};
use crate::error::ProviderError;
use crate::readers::CsvColumnSource;
use crate::record::Batch;

/// Asynchronous provider of aligned `(features, labels)` batches.
///
/// Construction returns immediately; two loader threads stream the feature
/// and label files into shared buffers in the background while a third
/// thread keeps reshuffling the sampling order and a fourth finalizes the
/// index once both loaders are done.
///
/// # Thread safety:
/// - `DataProvider` is `Send + Sync`; share it with `Arc` to serve several
///   consumers. Concurrent `get` calls may return overlapping samples.
/// - Dropping the provider (or calling `shutdown`) stops and joins every
///   background thread.
pub struct DataProvider {
    shared: Arc<Shared>,
    config: ProviderConfig,
    shutdown: Arc<AtomicBool>,
    stop_tx: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Point-in-time view of a provider's loading progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    pub load_finished: bool,
    pub stopped: bool,
    pub features: usize,
    pub labels: usize,
    /// One message per loader that terminated with an error.
    pub failures: Vec<String>,
}

impl ProviderStatus {
    /// Number of aligned pairs that `get` can draw from.
    pub fn available(&self) -> usize {
        self.features.min(self.labels)
    }

    pub fn is_aligned(&self) -> bool {
        self.features == self.labels
    }
}

impl DataProvider {
    /// Starts loading `feature_path` and `label_path` with the default configuration.
    pub fn new(feature_path: impl Into<PathBuf>, label_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(feature_path, label_path, ProviderConfig::default())
    }

    /// Starts loading with a custom configuration.
    ///
    /// Missing or unreadable files are not reported here: the corresponding
    /// loader fails in the background and the failure shows up in
    /// [`status`](Self::status).
    pub fn with_config(
        feature_path: impl Into<PathBuf>,
        label_path: impl Into<PathBuf>,
        config: ProviderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let provider = Self {
            shared: Arc::new(Shared::new(StdRng::seed_from_u64(seed))),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            stop_tx: Mutex::new(Some(stop_tx)),
            workers: Mutex::new(Vec::new()),
        };

        let feature_source = CsvColumnSource::new(feature_path, provider.config.feature_columns);
        let label_source = CsvColumnSource::new(label_path, provider.config.label_columns);

        let shuffler = {
            let shared = provider.shared.clone();
            let interval = provider.config.shuffle_interval;
            let rng = StdRng::seed_from_u64(seed.wrapping_add(1));
            spawn_named("index-shuffler", move || {
                run_shuffle_worker(&shared, &stop_rx, interval, rng)
            })?
        };
        provider.workers_lock().push(shuffler);

        // Loader handles go straight to the watcher, so a failed spawn below
        // never leaves an unjoined loader behind: dropping `loader_tx` lets the
        // watcher join what was sent, and dropping `provider` joins the watcher.
        let (loader_tx, loader_rx) = unbounded::<LoaderHandle>();
        let watcher = {
            let shared = provider.shared.clone();
            spawn_named("load-watcher", move || run_watcher(&shared, &loader_rx))?
        };
        provider.workers_lock().push(watcher);

        let handle = provider.spawn_loader("feature-loader", feature_source, run_feature_loader)?;
        provider.hand_to_watcher(&loader_tx, "feature loader", handle)?;
        let handle = provider.spawn_loader("label-loader", label_source, run_label_loader)?;
        provider.hand_to_watcher(&loader_tx, "label loader", handle)?;
        drop(loader_tx);

        info!(
            "data provider started (group size {}, flush threshold {}, seed {})",
            provider.config.group_size, provider.config.flush_threshold, seed
        );
        Ok(provider)
    }

    fn spawn_loader(
        &self,
        thread_name: &str,
        source: CsvColumnSource,
        run: fn(&CsvColumnSource, &ProviderConfig, &Shared, &AtomicBool) -> Result<usize>,
    ) -> Result<JoinHandle<Result<usize>>> {
        let shared = self.shared.clone();
        let shutdown = self.shutdown.clone();
        let config = self.config.clone();
        spawn_named(thread_name, move || {
            run(&source, &config, &shared, &shutdown)
                .with_context(|| format!("loading {}", source.path().display()))
        })
    }

    fn hand_to_watcher(
        &self,
        loader_tx: &Sender<LoaderHandle>,
        name: &'static str,
        handle: JoinHandle<Result<usize>>,
    ) -> Result<()> {
        loader_tx.send(LoaderHandle { name, handle }).map_err(|e| {
            // The watcher is gone; join the loader here instead.
            self.shutdown.store(true, Ordering::SeqCst);
            let _ = e.into_inner().handle.join();
            anyhow::anyhow!("load watcher exited before {} was registered", name)
        })
    }

    fn workers_lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Blocks until `batch_size` aligned samples are available, then returns
    /// a random batch of exactly that size.
    ///
    /// A request larger than the total amount of data never returns; a
    /// warning is logged once loading has finished. Use
    /// [`get_timeout`](Self::get_timeout) to bound the wait.
    ///
    /// # Errors
    /// - `InvalidBatchSize` for `batch_size == 0`
    /// - `Stopped` once the provider is shut down
    /// - `Misaligned` after loading when `strict_alignment` is set and the
    ///   buffers differ in length
    pub fn get(&self, batch_size: usize) -> Result<Batch, ProviderError> {
        self.get_until(batch_size, None)
    }

    /// Like [`get`](Self::get) but gives up with `ProviderError::Timeout` after `timeout`.
    pub fn get_timeout(&self, batch_size: usize, timeout: Duration) -> Result<Batch, ProviderError> {
        self.get_until(batch_size, Some(Instant::now() + timeout))
    }

    fn get_until(&self, batch_size: usize, deadline: Option<Instant>) -> Result<Batch, ProviderError> {
        if batch_size == 0 {
            return Err(ProviderError::InvalidBatchSize);
        }

        let mut warned = false;
        let mut state = self.shared.lock();
        loop {
            if state.stopped {
                return Err(ProviderError::Stopped);
            }
            if state.load_finished && self.config.strict_alignment && !state.is_aligned() {
                return Err(ProviderError::Misaligned {
                    features: state.features.len(),
                    labels: state.labels.len(),
                });
            }

            let available = state.available();
            if available >= batch_size {
                return Ok(state.sample(batch_size));
            }

            if state.load_finished && deadline.is_none() && !warned {
                warn!(
                    "requested a batch of {} but loading finished with {} aligned samples; \
                     this call will block until shutdown",
                    batch_size, available
                );
                warned = true;
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ProviderError::Timeout {
                            requested: batch_size,
                            available,
                        });
                    }
                    remaining.min(self.config.poll_interval)
                }
                None => self.config.poll_interval,
            };
            state = self.shared.wait(state, wait);
        }
    }

    pub fn status(&self) -> ProviderStatus {
        let state = self.shared.lock();
        ProviderStatus {
            load_finished: state.load_finished,
            stopped: state.stopped,
            features: state.features.len(),
            labels: state.labels.len(),
            failures: state.failures.clone(),
        }
    }

    /// Waits until both loaders have finished (successfully or not).
    ///
    /// Returns `false` if `timeout` elapsed first. `None` waits indefinitely.
    pub fn wait_until_loaded(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.lock();
        loop {
            if state.load_finished {
                return true;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    remaining.min(self.config.poll_interval)
                }
                None => self.config.poll_interval,
            };
            state = self.shared.wait(state, wait);
        }
    }

    /// Stops every background thread and wakes blocked callers with
    /// `ProviderError::Stopped`. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.update(|state| state.stopped = true);
        self.stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers: Vec<_> = self.workers_lock().drain(..).collect();
        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                warn!("{} panicked before shutdown", name);
            }
        }
        info!("data provider shut down");
    }
}

impl Drop for DataProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
