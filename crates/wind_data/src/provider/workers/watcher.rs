//! Completion watcher: the single place where loading is finalized.

use anyhow::Result;
use crossbeam_channel::Receiver;
use log::{error, info, warn};
use std::thread::JoinHandle;

use crate::provider::state::Shared;

pub(crate) struct LoaderHandle {
    pub(crate) name: &'static str,
    pub(crate) handle: JoinHandle<Result<usize>>,
}

/// Joins every loader received on `loaders` until the sending side is
/// dropped, records failures, then flips `load_finished` and rebuilds the
/// index array over the final aligned length.
pub(crate) fn run_watcher(shared: &Shared, loaders: &Receiver<LoaderHandle>) {
    let mut failures = Vec::new();
    for LoaderHandle { name, handle } in loaders {
        match handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!("{} failed: {:#}", name, e);
                failures.push(format!("{}: {:#}", name, e));
            }
            Err(_) => {
                error!("{} panicked", name);
                failures.push(format!("{}: panicked", name));
            }
        }
    }

    let (features, labels) = shared.update(|state| {
        state.failures.extend(failures);
        state.finish_loading();
        (state.features.len(), state.labels.len())
    });

    if features != labels {
        warn!(
            "feature and label counts differ ({} vs {}); only the first {} pairs are served",
            features,
            labels,
            features.min(labels)
        );
    }
    info!(
        "loading finished: {} feature records, {} labels",
        features, labels
    );
}
