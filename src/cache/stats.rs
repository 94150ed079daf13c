//! Disk Cache Statistics Module
//!
//! Point-in-time counters for one disk region.

use serde::Serialize;

// == Disk Cache Stats ==
/// Snapshot of a region's size, recycling and compaction counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskCacheStats {
    /// Region name
    pub cache_name: String,
    /// Number of live keys in the key index
    pub entry_count: usize,
    /// Data file high-water mark in bytes
    pub data_file_length: u64,
    /// Removals since the last compaction, counted toward the
    /// `optimize_at_remove_count` threshold. Not the number of compactions;
    /// see `times_compacted` for that.
    pub compaction_count: usize,
    /// Number of completed compactions
    pub times_compacted: u64,
    /// Number of puts that reused a recycled slot
    pub recycle_count: u64,
    /// Free slots currently held by the recycle bin
    pub recycle_bin_size: usize,
    /// Number of gets that found a record
    pub hits: u64,
    /// Number of gets that found nothing
    pub misses: u64,
    /// False once the region has been disposed
    pub alive: bool,
}

impl DiskCacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no gets have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
