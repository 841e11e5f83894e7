//! src/provider/state.rs
//!
//! The single critical section shared by the loaders, the shuffle worker,
//! the watcher and every `get` caller.
//!
//! Both buffers, the index array, the lifecycle flags and the sampling RNG
//! live in one `SharedState` behind one `Mutex`. There are no per-field
//! locks: a caller holding the guard never observes a buffer mid-append or
//! an index array that disagrees with the buffer lengths.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::record::{Batch, FeatureRecord};

/// Append-only ordered sequence populated by one loader.
#[derive(Debug)]
pub(crate) struct Buffer<T> {
    items: Vec<T>,
}

impl<T> Buffer<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Moves every item out of `chunk`, preserving order. Returns the count moved.
    pub(crate) fn append(&mut self, chunk: &mut Vec<T>) -> usize {
        let moved = chunk.len();
        self.items.append(chunk);
        moved
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> std::ops::Index<usize> for Buffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

pub(crate) struct SharedState {
    pub(crate) features: Buffer<FeatureRecord>,
    pub(crate) labels: Buffer<f32>,
    pub(crate) index: Vec<usize>,
    pub(crate) load_finished: bool,
    pub(crate) stopped: bool,
    pub(crate) failures: Vec<String>,
    rng: StdRng,
}

impl SharedState {
    pub(crate) fn new(rng: StdRng) -> Self {
        Self {
            features: Buffer::new(),
            labels: Buffer::new(),
            index: Vec::new(),
            load_finished: false,
            stopped: false,
            failures: Vec::new(),
            rng,
        }
    }

    /// Number of aligned (feature, label) pairs.
    pub(crate) fn available(&self) -> usize {
        self.features.len().min(self.labels.len())
    }

    pub(crate) fn is_aligned(&self) -> bool {
        self.features.len() == self.labels.len()
    }

    fn reset_index(&mut self) {
        let available = self.available();
        self.index.clear();
        self.index.extend(0..available);
    }

    /// Marks loading complete and freezes the index array over the final
    /// aligned length. Only the watcher calls this.
    pub(crate) fn finish_loading(&mut self) {
        self.load_finished = true;
        self.reset_index();
    }

    /// Draws `batch_size` distinct positions and gathers both buffers at them.
    ///
    /// While loading is in progress the index array is first rebuilt over the
    /// current aligned length, which discards the shuffle worker's permutation.
    /// Caller guarantees `available() >= batch_size`.
    pub(crate) fn sample(&mut self, batch_size: usize) -> Batch {
        debug_assert!(batch_size <= self.available());

        if !self.load_finished {
            self.reset_index();
        }
        self.index.shuffle(&mut self.rng);

        let picks = &self.index[..batch_size];
        let features = picks.iter().map(|&i| self.features[i].clone()).collect();
        let labels = picks.iter().map(|&i| self.labels[i]).collect();
        Batch::new(features, labels)
    }
}

/// `SharedState` plus the condition variable signalled after every append,
/// finalization and shutdown.
pub(crate) struct Shared {
    state: Mutex<SharedState>,
    data_ready: Condvar,
}

impl Shared {
    pub(crate) fn new(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(SharedState::new(rng)),
            data_ready: Condvar::new(),
        }
    }

    /// Acquires the lock. A worker that panicked while holding it leaves the
    /// state intact (every mutation is a single append or flag flip), so a
    /// poisoned lock is recovered rather than propagated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for a notification or `timeout`, whichever comes first.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, SharedState>,
        timeout: Duration,
    ) -> MutexGuard<'a, SharedState> {
        let (guard, _) = self
            .data_ready
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }

    pub(crate) fn notify_all(&self) {
        self.data_ready.notify_all();
    }

    /// Runs `update` under the lock and wakes every waiter afterwards.
    pub(crate) fn update<R>(&self, update: impl FnOnce(&mut SharedState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            update(&mut state)
        };
        self.notify_all();
        result
    }
}
