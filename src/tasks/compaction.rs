//! Compaction Task
//!
//! Runs a real-time compaction of one region on its own task.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::IndexedDiskCache;

/// Spawns a background compaction of `cache`.
///
/// At most one compaction runs per region; returns None if one is already
/// in progress. The removal counter is cleared once the pass ends, whether
/// it swapped in the new file or was abandoned.
pub fn spawn_compaction_task(cache: IndexedDiskCache) -> Option<JoinHandle<()>> {
    if !cache.begin_optimizing() {
        debug!("Compaction of {} already running", cache.cache_name());
        return None;
    }

    Some(tokio::spawn(async move {
        cache.optimize_real_time().await;
        cache.finish_optimizing();
    }))
}
