//! Background tasks owned by a `DataProvider`.
//!
//! - `loader`: streams one CSV into one buffer in fixed-size chunks
//! - `shuffle`: periodically permutes the index array
//! - `watcher`: joins the loaders and finalizes the index array
//!
//! All of them coordinate only through `Shared`. Loaders observe the
//! provider's stop flag between rows; the shuffle worker exits when its stop
//! channel disconnects; the watcher exits once both loaders have.

pub(crate) mod loader;
pub(crate) mod shuffle;
pub(crate) mod watcher;

use anyhow::{Context, Result};
use std::thread::{self, JoinHandle};

/// Spawns a named worker thread.
pub(crate) fn spawn_named<F, T>(name: &str, task: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(task)
        .with_context(|| format!("Failed to spawn {} thread", name))
}
