//! Concurrency tests for DataProvider.
//!
//! Tests cover:
//! - Many concurrent consumers against a fully loaded provider
//! - Consumers racing the loaders
//! - Dropping a provider while its loaders are still running

mod common;
use common::{fast_config, write_features, write_matching_labels, LOAD_TIMEOUT};
use wind_data::{DataProvider, ProviderError};

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test_log::test]
fn test_concurrent_consumers_on_loaded_provider() -> Result<()> {
    let features = write_features(400, 0)?;
    let labels = write_matching_labels(400)?;
    let provider = Arc::new(DataProvider::with_config(
        features.path(),
        labels.path(),
        fast_config().build(),
    )?);
    assert!(provider.wait_until_loaded(LOAD_TIMEOUT));

    let served = Arc::new(AtomicUsize::new(0));
    let consumers: Vec<_> = (0..8)
        .map(|id| {
            let provider = provider.clone();
            let served = served.clone();
            thread::spawn(move || -> Result<(), ProviderError> {
                for step in 0..50 {
                    let batch_size = 1 + (id * 50 + step) % 64;
                    let batch = provider.get_timeout(batch_size, Duration::from_secs(5))?;
                    assert_eq!(batch.len(), batch_size);
                    for (record, label) in batch.iter() {
                        assert!(record.values().iter().all(|&v| v == label));
                    }
                    served.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
        })
        .collect();

    for consumer in consumers {
        consumer.join().expect("consumer panicked")?;
    }
    assert_eq!(served.load(Ordering::SeqCst), 8 * 50);
    Ok(())
}

#[test_log::test]
fn test_consumers_racing_the_loaders_stay_aligned() -> Result<()> {
    let features = write_features(3_000, 0)?;
    let labels = write_matching_labels(3_000)?;
    let config = fast_config().flush_threshold(25).build();
    let provider = Arc::new(DataProvider::with_config(features.path(), labels.path(), config)?);

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let provider = provider.clone();
            thread::spawn(move || -> Result<(), ProviderError> {
                for _ in 0..100 {
                    let batch = provider.get_timeout(16, Duration::from_secs(10))?;
                    assert_eq!(batch.len(), 16);
                    for (record, label) in batch.iter() {
                        assert!(
                            record.values().iter().all(|&v| v == label),
                            "misaligned pair: {:?} / {}",
                            record,
                            label
                        );
                    }
                }
                Ok(())
            })
        })
        .collect();

    for consumer in consumers {
        consumer.join().expect("consumer panicked")?;
    }
    assert!(provider.wait_until_loaded(LOAD_TIMEOUT));
    assert_eq!(provider.status().available(), 3_000);
    Ok(())
}

#[test_log::test]
fn test_shutdown_releases_every_waiter() -> Result<()> {
    let features = write_features(2, 0)?;
    let labels = write_matching_labels(2)?;
    let provider = Arc::new(DataProvider::with_config(
        features.path(),
        labels.path(),
        fast_config().build(),
    )?);

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let provider = provider.clone();
            thread::spawn(move || provider.get(100))
        })
        .collect();

    thread::sleep(Duration::from_millis(100));
    provider.shutdown();

    for waiter in waiters {
        assert_eq!(waiter.join().expect("waiter panicked"), Err(ProviderError::Stopped));
    }
    Ok(())
}

#[test_log::test]
fn test_drop_during_loading_joins_workers() -> Result<()> {
    let features = write_features(20_000, 0)?;
    let labels = write_matching_labels(20_000)?;

    let started = Instant::now();
    {
        let provider = DataProvider::with_config(
            features.path(),
            labels.path(),
            fast_config().flush_threshold(10).build(),
        )?;
        let _ = provider.get(1)?;
    }
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "dropping the provider took {:?}",
        started.elapsed()
    );
    Ok(())
}
