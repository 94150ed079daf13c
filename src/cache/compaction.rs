//! Compaction Module
//!
//! Rewrites every live record into a fresh data file and index, then swaps
//! them in place of the live pair. Two modes share the same core:
//! - synchronous, under one exclusive hold (dispose)
//! - real-time, copying one key per short exclusive hold while the region
//!   keeps serving, then draining the keys put meanwhile

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cache::disk::IndexedDisk;
use crate::cache::store::Storage;
use crate::cache::{CacheKey, DiscardEvicted, IndexedDiskCache, KeyIndex, RecycleBin};
use crate::error::Result;

// == Rewrite ==
/// The temporary file and index a compaction pass fills.
#[derive(Debug)]
pub(crate) struct Rewrite {
    data_file: IndexedDisk,
    index: KeyIndex,
}

impl Rewrite {
    /// Starts an empty rewrite at `path`, discarding anything left there.
    ///
    /// The temporary index is unbounded: keys removed from the live index
    /// mid-pass stay in it until the swap, and must not evict live ones.
    pub(crate) fn begin(path: &Path) -> Result<Self> {
        Ok(Self {
            data_file: IndexedDisk::create_empty(path)?,
            index: KeyIndex::new(usize::MAX),
        })
    }

    /// Copies the live record of `key`, or forgets `key` if the live index lost it.
    pub(crate) fn copy_key(&mut self, live: &Storage, key: &CacheKey) -> Result<()> {
        let Some(descriptor) = live.index.get(key) else {
            self.index.remove(key);
            return Ok(());
        };

        let bytes = live.data_file.read_record(descriptor)?;
        let copied = self.data_file.append(&bytes)?;
        debug!(
            "Compaction: put to temp file, key: {}, position: {}, size: {}",
            key,
            copied.offset(),
            copied.length()
        );
        self.index.insert(key.clone(), copied, &mut DiscardEvicted);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Drops the pass and its temporary file. The live pair is untouched.
    pub(crate) fn abandon(self) {
        let path = self.data_file.path().to_path_buf();
        if let Err(e) = self.data_file.delete() {
            warn!("Failure deleting {}: {}", path.display(), e);
        }
    }
}

// == Swap ==
/// Replaces the live data file, index and recycle bin with the rewrite.
///
/// If the rewrite cannot even be closed, the live pair is left as it was.
/// Any failure after the live file is closed resets the region, so the
/// index never outlives the file it describes.
pub(crate) fn swap_in(storage: &mut Storage, rewrite: Rewrite) -> Result<()> {
    let Rewrite {
        mut data_file,
        mut index,
    } = rewrite;

    // Removed or evicted from the live index while the pass ran
    index.remove_where(|key| !storage.index.contains_key(key));
    index.set_capacity(storage.index.capacity(), &mut DiscardEvicted);

    let temp_path = data_file.path().to_path_buf();
    if let Err(e) = data_file.close() {
        Rewrite { data_file, index }.abandon();
        return Err(e.into());
    }

    if let Err(e) = replace_live(storage, &temp_path, index) {
        error!(
            "Failure replacing files of {}, resetting: {}",
            storage.cache_name, e
        );
        storage.reset()?;
        return Err(e);
    }
    Ok(())
}

fn replace_live(storage: &mut Storage, temp_path: &Path, index: KeyIndex) -> Result<()> {
    let live_path = storage.data_file.path().to_path_buf();
    info!(
        "{} -- old data length = {}, new data length = {}",
        storage.cache_name,
        storage.data_file.length(),
        fs::metadata(temp_path)?.len()
    );

    // A crash from here on leaves an empty key file, which restarts clean
    storage.key_file.reset()?;
    storage.data_file.close()?;
    fs::rename(temp_path, &live_path)?;
    storage.data_file = IndexedDisk::open(&live_path)?;

    storage.index = index;
    // Old free slots point into the replaced file
    storage.recycle = RecycleBin::new(storage.recycle.capacity());
    storage.save_keys()
}

impl IndexedDiskCache {
    // == Synchronous Compaction ==
    /// Compacts while the caller holds the storage lock exclusively.
    pub(crate) fn optimize_file(&self, storage: &mut Storage) -> Result<()> {
        let start = Instant::now();
        info!(
            "Optimizing file {}, key count = {}",
            self.cache_name(),
            storage.index.len()
        );

        let mut rewrite = Rewrite::begin(&self.inner.config.temp_data_file_path())?;

        let keys: Vec<CacheKey> = storage.index.keys().cloned().collect();
        for key in &keys {
            if let Err(e) = rewrite.copy_key(storage, key) {
                error!(
                    "Problem in optimization of {}, abandoning attempt: {}",
                    self.cache_name(),
                    e
                );
                rewrite.abandon();
                return Err(e);
            }
        }

        swap_in(storage, rewrite)?;
        self.inner.times_optimized.fetch_add(1, Ordering::AcqRel);
        info!(
            "Finished optimizing {} in {} millis",
            self.cache_name(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    // == Real-Time Compaction ==
    /// Compacts while the region keeps serving.
    ///
    /// 1. Snapshot the live keys and start collecting keys put from now on.
    /// 2. Copy each snapshot key under its own short exclusive hold.
    /// 3. Copy keys put meanwhile, one hold each.
    /// 4. Under one exclusive hold: copy the last queued keys and swap.
    ///
    /// Any failure or reset along the way abandons the pass; the live pair
    /// is only touched by the final swap.
    pub(crate) async fn optimize_real_time(&self) {
        let start = Instant::now();
        let round = self.inner.times_optimized.load(Ordering::Acquire) + 1;
        info!(
            "Beginning real time optimization #{} of {}",
            round,
            self.cache_name()
        );

        let (pending_tx, mut pending_rx) = mpsc::unbounded_channel();
        let (keys, generation) = {
            let mut storage = self.inner.storage.write().await;
            if !self.is_alive() {
                return;
            }
            storage.pending_puts = Some(pending_tx);
            let keys: Vec<CacheKey> = storage.index.keys().cloned().collect();
            (keys, storage.generation)
        };

        let mut rewrite = match Rewrite::begin(&self.inner.config.temp_data_file_path()) {
            Ok(rewrite) => rewrite,
            Err(e) => {
                error!("Failure creating temp file for {}: {}", self.cache_name(), e);
                self.stop_collecting(generation).await;
                return;
            }
        };
        info!("Optimizing RT -- temp keys, length = {}", keys.len());

        for key in &keys {
            let storage = self.inner.storage.write().await;
            if !self.still_current(&storage, generation) {
                drop(storage);
                rewrite.abandon();
                return;
            }
            if let Err(e) = rewrite.copy_key(&storage, key) {
                error!(
                    "Failure optimizing real time, cacheName: {}: {}",
                    self.cache_name(),
                    e
                );
                drop(storage);
                self.stop_collecting(generation).await;
                rewrite.abandon();
                return;
            }
        }

        // Keys put during the first pass, bounded so steady traffic cannot starve the swap
        for _ in 0..keys.len() {
            let storage = self.inner.storage.write().await;
            if !self.still_current(&storage, generation) {
                drop(storage);
                rewrite.abandon();
                return;
            }
            let Ok(key) = pending_rx.try_recv() else {
                break;
            };
            if let Err(e) = rewrite.copy_key(&storage, &key) {
                error!(
                    "Failure optimizing real time, cacheName: {}: {}",
                    self.cache_name(),
                    e
                );
                drop(storage);
                self.stop_collecting(generation).await;
                rewrite.abandon();
                return;
            }
        }

        let mut storage = self.inner.storage.write().await;
        if !self.still_current(&storage, generation) {
            drop(storage);
            rewrite.abandon();
            return;
        }
        storage.pending_puts = None;

        let mut remaining = HashSet::new();
        while let Ok(key) = pending_rx.try_recv() {
            remaining.insert(key);
        }
        info!("Optimizing RT -- put list, size = {}", remaining.len());

        for key in &remaining {
            if let Err(e) = rewrite.copy_key(&storage, key) {
                error!(
                    "Failure optimizing real time, cacheName: {}: {}",
                    self.cache_name(),
                    e
                );
                drop(storage);
                rewrite.abandon();
                return;
            }
        }

        info!(
            "Optimizing RT -- replacing files, temp key count = {}",
            rewrite.len()
        );
        match swap_in(&mut storage, rewrite) {
            Ok(()) => {
                self.inner.times_optimized.fetch_add(1, Ordering::AcqRel);
                info!(
                    "Finished #{} real time optimization of {} in {} millis",
                    round,
                    self.cache_name(),
                    start.elapsed().as_millis()
                );
            }
            Err(e) => error!(
                "Failure optimizing real time, cacheName: {}: {}",
                self.cache_name(),
                e
            ),
        }
    }

    /// False once the region was disposed or reset since the pass began.
    fn still_current(&self, storage: &Storage, generation: u64) -> bool {
        let current = self.is_alive() && storage.generation == generation;
        if !current {
            info!(
                "Region {} was reset or disposed, abandoning optimization",
                self.cache_name()
            );
        }
        current
    }

    async fn stop_collecting(&self, generation: u64) {
        let mut storage = self.inner.storage.write().await;
        if storage.generation == generation {
            storage.pending_puts = None;
        }
    }
}
