//! Key Save Task
//!
//! Background task that periodically persists the key index, so a crash
//! loses at most one interval of puts.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::IndexedDiskCache;

/// Spawns a background task that saves the key index every `interval_secs`.
///
/// The task stops by itself once the region is disposed. The returned handle
/// can be used to abort it earlier during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = IndexedDiskCache::open(config)?;
/// let key_save_handle = spawn_key_save_task(cache.clone(), 30);
/// // Later, during shutdown:
/// key_save_handle.abort();
/// ```
pub fn spawn_key_save_task(cache: IndexedDiskCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting key save task for {} with interval of {} seconds",
            cache.cache_name(),
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            if !cache.is_alive() {
                debug!("Region {} disposed, stopping key save task", cache.cache_name());
                break;
            }

            match cache.save_keys().await {
                Ok(()) => debug!("Key save: persisted keys of {}", cache.cache_name()),
                Err(e) => error!("Key save of {} failed: {}", cache.cache_name(), e),
            }
        }
    })
}
