//! Periodic in-place shuffle of the index array.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::time::Duration;

use crate::provider::state::Shared;

/// Shuffles the index array once per `interval` until `stop_rx` receives a
/// message or disconnects.
pub(crate) fn run_shuffle_worker(
    shared: &Shared,
    stop_rx: &Receiver<()>,
    interval: Duration,
    mut rng: StdRng,
) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let mut state = shared.lock();
                state.index.shuffle(&mut rng);
                trace!("shuffled {} indices", state.index.len());
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use rand::SeedableRng;
    use std::thread;

    #[test]
    fn shuffles_until_stopped() {
        let shared = std::sync::Arc::new(Shared::new(StdRng::seed_from_u64(1)));
        shared.lock().index = (0..64).collect();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                run_shuffle_worker(
                    &shared,
                    &stop_rx,
                    Duration::from_millis(5),
                    StdRng::seed_from_u64(2),
                )
            })
        };

        thread::sleep(Duration::from_millis(60));
        drop(stop_tx);
        worker.join().expect("shuffle worker panicked");

        let mut index = shared.lock().index.clone();
        assert_ne!(index, (0..64).collect::<Vec<_>>());
        index.sort_unstable();
        assert_eq!(index, (0..64).collect::<Vec<_>>());
    }
}
