//! Indexed Disk Cache Module
//!
//! Disk engine combining the data file, key index and recycle bin under one
//! storage lock per region.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::disk::{remove_if_exists, IndexedDisk};
use crate::cache::{
    CacheElement, CacheKey, DiskCacheStats, GroupId, KeyIndex, RecordDescriptor, RecycleBin,
};
use crate::config::DiskCacheConfig;
use crate::error::{DiskCacheError, Result};

// == Storage ==
/// Everything guarded by the storage lock.
#[derive(Debug)]
pub(crate) struct Storage {
    pub(crate) cache_name: String,
    pub(crate) data_file: IndexedDisk,
    pub(crate) key_file: IndexedDisk,
    pub(crate) index: KeyIndex,
    pub(crate) recycle: RecycleBin,
    /// Keys put while a background compaction pass runs
    pub(crate) pending_puts: Option<mpsc::UnboundedSender<CacheKey>>,
    /// Bumped by every reset
    pub(crate) generation: u64,
}

impl Storage {
    /// Opens the region files and rebuilds the index from the key file.
    fn open(config: &DiskCacheConfig) -> Result<Self> {
        let data_file = IndexedDisk::open(config.data_file_path())?;
        let key_file = IndexedDisk::open(config.key_file_path())?;
        let mut recycle = RecycleBin::new(config.max_recycle_bin_size);

        let index = if key_file.length() > 0 {
            load_keys(config, &key_file, &mut recycle)
        } else {
            KeyIndex::new(config.max_key_size)
        };

        let mut storage = Self {
            cache_name: config.cache_name.clone(),
            data_file,
            key_file,
            index,
            recycle,
            pending_puts: None,
            generation: 0,
        };

        if storage.index.is_empty() {
            if storage.data_file.length() > 0 || storage.key_file.length() > 0 {
                storage.reset()?;
            }
        } else if !storage.check_key_data_consistency() {
            warn!(
                "Corruption detected in {}, resetting data and key files",
                storage.cache_name
            );
            storage.reset()?;
        }

        Ok(storage)
    }

    // == Consistency Check ==
    /// Verifies every descriptor lies within the data file.
    pub(crate) fn check_key_data_consistency(&self) -> bool {
        info!("Performing initial consistency check for {}", self.cache_name);
        let length = self.data_file.length();

        for (key, descriptor) in self.index.iter() {
            let in_bounds = descriptor.end().is_some_and(|end| end <= length);
            if !in_bounds {
                warn!(
                    "The data file of {} is corrupted: key '{}' at {} ({} bytes), file length = {}",
                    self.cache_name,
                    key,
                    descriptor.offset(),
                    descriptor.length(),
                    length
                );
                return false;
            }
        }

        info!("Finished initial consistency check for {}", self.cache_name);
        true
    }

    // == Read Element ==
    pub(crate) fn read_element(&self, key: &CacheKey) -> Result<Option<CacheElement>> {
        let Some(descriptor) = self.index.get(key) else {
            return Ok(None);
        };

        debug!("Found on disk, key: {}", key);
        let bytes = self.data_file.read_record(descriptor)?;
        let element = CacheElement::from_bytes(&bytes)?;

        if &element.key != key {
            return Err(DiskCacheError::Corrupted {
                key: key.to_string(),
                reason: format!("record at {} holds key '{}'", descriptor.offset(), element.key),
            });
        }
        Ok(Some(element))
    }

    // == Write Element ==
    /// Places `data` for `key` and installs its descriptor.
    ///
    /// Returns true if the slot came from the recycle bin.
    fn write_element(&mut self, key: CacheKey, data: &[u8]) -> Result<bool> {
        let length =
            u32::try_from(data.len()).map_err(|_| DiskCacheError::RecordTooLarge(data.len()))?;

        let mut recycled = None;
        let offset = match self.index.get(&key) {
            // Fits where the old value was; the unused tail stays with the key
            Some(old) if old.length() >= length => old.offset(),
            _ => match self.recycle.reserve(length) {
                Some(slot) => {
                    debug!(
                        "Using recycled slot at {}, slot length = {}, record length = {}",
                        slot.offset(),
                        slot.length(),
                        length
                    );
                    let offset = slot.offset();
                    recycled = Some(slot);
                    offset
                }
                None => self.data_file.length(),
            },
        };

        if let Err(e) = self.data_file.write(offset, data) {
            if let Some(slot) = recycled {
                self.recycle.release(slot);
            }
            return Err(e.into());
        }

        let previous = self.index.insert(
            key.clone(),
            RecordDescriptor::new(offset, length),
            &mut self.recycle,
        );
        if let Some(previous) = previous {
            if previous.offset() != offset {
                self.recycle.release(previous);
            }
        }

        if let Some(pending) = &self.pending_puts {
            // Receiver only goes away once the pass no longer needs keys
            let _ = pending.send(key.clone());
        }

        debug!(
            "Put to file: {}, key: {}, position: {}, size: {}",
            self.cache_name, key, offset, length
        );
        Ok(recycled.is_some())
    }

    // == Recycle Removed ==
    fn recycle_removed(&mut self, removed: Vec<(CacheKey, RecordDescriptor)>) -> bool {
        let any = !removed.is_empty();
        for (key, descriptor) in removed {
            debug!(
                "Disk removal: key '{}', recycling slot at {} ({} bytes)",
                key,
                descriptor.offset(),
                descriptor.length()
            );
            self.recycle.release(descriptor);
        }
        any
    }

    // == Save Keys ==
    /// Rewrites the key file with the current index.
    pub(crate) fn save_keys(&mut self) -> Result<()> {
        debug!(
            "Saving keys to: {}, key count: {}",
            self.key_file.path().display(),
            self.index.len()
        );

        if self.index.is_empty() {
            self.key_file.reset()?;
        } else {
            let snapshot = self.index.to_snapshot()?;
            self.key_file.overwrite(&snapshot)?;
        }
        self.key_file.sync()?;
        Ok(())
    }

    // == Reset ==
    /// Deletes both files, reopens them empty and forgets every descriptor.
    pub(crate) fn reset(&mut self) -> Result<()> {
        info!("Resetting cache {}", self.cache_name);

        self.generation += 1;
        self.pending_puts = None;
        self.index = KeyIndex::new(self.index.capacity());
        self.recycle = RecycleBin::new(self.recycle.capacity());

        let data_path = self.data_file.path().to_path_buf();
        let key_path = self.key_file.path().to_path_buf();

        for disk in [&mut self.data_file, &mut self.key_file] {
            if let Err(e) = disk.close() {
                warn!("Failure closing {} during reset: {}", disk.path().display(), e);
            }
        }
        remove_if_exists(&data_path)?;
        remove_if_exists(&key_path)?;

        self.data_file = IndexedDisk::open(&data_path)?;
        self.key_file = IndexedDisk::open(&key_path)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.data_file.close()?;
        self.key_file.close()?;
        Ok(())
    }
}

/// Reads the key file into a fresh index. Unreadable snapshots yield an empty index.
fn load_keys(config: &DiskCacheConfig, key_file: &IndexedDisk, recycle: &mut RecycleBin) -> KeyIndex {
    info!("Loading keys for {}", key_file.path().display());

    let loaded = key_file
        .read_all()
        .map_err(DiskCacheError::from)
        .and_then(|bytes| {
            KeyIndex::from_snapshot(&bytes, config.max_key_size, recycle).map_err(Into::into)
        });

    match loaded {
        Ok(index) => {
            info!(
                "Loaded keys from: {}, key count: {}",
                config.cache_name,
                index.len()
            );
            index
        }
        Err(e) => {
            error!("Failure loading keys for {}: {}", config.cache_name, e);
            KeyIndex::new(config.max_key_size)
        }
    }
}

// == Indexed Disk Cache ==
/// Shared state behind an [`IndexedDiskCache`] handle.
#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) config: DiskCacheConfig,
    /// The storage lock
    pub(crate) storage: RwLock<Storage>,
    pub(crate) alive: AtomicBool,
    /// Set once the files have been closed by dispose
    disposed: AtomicBool,
    /// Single-flight guard for compaction
    pub(crate) optimizing: AtomicBool,
    /// Removals since the last compaction
    pub(crate) remove_count: AtomicUsize,
    pub(crate) times_optimized: AtomicU64,
    recycle_count: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Disk tier for one cache region.
///
/// Cheap to clone; clones share the same region. Reads take the storage lock
/// shared, structural changes take it exclusively.
#[derive(Debug, Clone)]
pub struct IndexedDiskCache {
    pub(crate) inner: Arc<Inner>,
}

impl IndexedDiskCache {
    // == Open ==
    /// Opens (or creates) the region described by `config`.
    ///
    /// A non-empty key file is loaded and checked against the data file; an
    /// empty or inconsistent result resets both files.
    pub fn open(config: DiskCacheConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.disk_path)?;
        info!("Cache file root directory: {}", config.disk_path.display());

        // Left behind by a compaction that never finished
        remove_if_exists(&config.temp_data_file_path())?;

        let storage = Storage::open(&config)?;
        info!(
            "Opened disk cache {}, key count: {}, data file length: {}",
            config.cache_name,
            storage.index.len(),
            storage.data_file.length()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                storage: RwLock::new(storage),
                alive: AtomicBool::new(true),
                disposed: AtomicBool::new(false),
                optimizing: AtomicBool::new(false),
                remove_count: AtomicUsize::new(0),
                times_optimized: AtomicU64::new(0),
                recycle_count: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.inner.config.cache_name
    }

    pub fn config(&self) -> &DiskCacheConfig {
        &self.inner.config
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    fn not_alive(&self) -> DiskCacheError {
        DiskCacheError::NotAlive(self.cache_name().to_string())
    }

    // == Put ==
    /// Writes `element` to disk, replacing any record held for its key.
    ///
    /// Failures are logged and returned; the element is simply not stored.
    pub async fn put(&self, element: &CacheElement) -> Result<()> {
        debug!("Storing element on disk, key: {}", element.key);
        let data = element.to_bytes()?;

        let mut storage = self.inner.storage.write().await;
        if !self.is_alive() {
            return Err(self.not_alive());
        }

        match storage.write_element(element.key.clone(), &data) {
            Ok(recycled) => {
                if recycled {
                    self.inner.recycle_count.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failure updating element, cacheName: {}, key: {}: {}",
                    self.cache_name(),
                    element.key,
                    e
                );
                Err(e)
            }
        }
    }

    // == Get ==
    /// Reads the element stored for `key`.
    ///
    /// An unreadable or mismatched record resets the region and the error is
    /// returned to the caller.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheElement>> {
        debug!("Trying to get from disk: {}", key);

        let result = {
            let storage = self.inner.storage.read().await;
            if !self.is_alive() {
                debug!(
                    "No longer alive so returning None, cacheName: {}, key: {}",
                    self.cache_name(),
                    key
                );
                return Ok(None);
            }
            storage.read_element(key)
        };

        match result {
            Ok(Some(element)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(element))
            }
            Ok(None) => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Failure getting from disk, cacheName: {}, key: {}: {}",
                    self.cache_name(),
                    key,
                    e
                );
                if let Err(reset_err) = self.reset().await {
                    error!("Failure resetting {}: {}", self.cache_name(), reset_err);
                }
                Err(e)
            }
        }
    }

    // == Group Keys ==
    /// Attribute names stored under `group_name` in this region.
    pub async fn get_group_keys(&self, group_name: &str) -> HashSet<String> {
        let group_id = GroupId::new(self.cache_name(), group_name);
        let storage = self.inner.storage.read().await;

        storage
            .index
            .keys()
            .filter_map(|key| key.attr_in_group(&group_id))
            .map(str::to_string)
            .collect()
    }

    // == Remove ==
    /// Removes `key`, or every key below it if it ends with the name delimiter.
    ///
    /// Returns true if anything was removed.
    pub async fn remove(&self, key: &CacheKey) -> bool {
        let removed = {
            let mut guard = self.inner.storage.write().await;
            if !self.is_alive() {
                return false;
            }
            let storage = &mut *guard;

            let removed = match key.hierarchy_prefix() {
                Some(prefix) => storage.index.remove_where(|k| k.is_under(prefix)),
                None => storage
                    .index
                    .remove(key)
                    .map(|descriptor| vec![(key.clone(), descriptor)])
                    .unwrap_or_default(),
            };
            storage.recycle_removed(removed)
        };

        if removed {
            self.record_removal();
        }
        removed
    }

    /// Removes every attribute of `group_id`.
    pub async fn remove_group(&self, group_id: &GroupId) -> bool {
        let removed = {
            let mut guard = self.inner.storage.write().await;
            if !self.is_alive() {
                return false;
            }
            let storage = &mut *guard;

            let removed = storage
                .index
                .remove_where(|k| k.attr_in_group(group_id).is_some());
            storage.recycle_removed(removed)
        };

        if removed {
            self.record_removal();
        }
        removed
    }

    /// Counts a removal and starts a background compaction at the threshold.
    fn record_removal(&self) {
        let threshold = self.inner.config.optimize_at_remove_count;
        let count = self.inner.remove_count.fetch_add(1, Ordering::AcqRel) + 1;

        if threshold > 0 && count >= threshold && !self.inner.optimizing.load(Ordering::Acquire) {
            info!(
                "Remove count {} reached for {}, starting compaction",
                count,
                self.cache_name()
            );
            crate::tasks::spawn_compaction_task(self.clone());
        }
    }

    // == Remove All ==
    pub async fn remove_all(&self) -> Result<()> {
        self.reset().await
    }

    // == Reset ==
    /// Empties the region: both files are recreated and all descriptors dropped.
    pub async fn reset(&self) -> Result<()> {
        let mut storage = self.inner.storage.write().await;
        if !self.is_alive() {
            return Err(self.not_alive());
        }
        storage.reset().map_err(|e| {
            error!("Failure resetting state of {}: {}", self.cache_name(), e);
            e
        })
    }

    // == Save Keys ==
    /// Persists the key index so a restart can find existing records.
    pub async fn save_keys(&self) -> Result<()> {
        let mut storage = self.inner.storage.write().await;
        if !self.is_alive() {
            return Err(self.not_alive());
        }
        storage.save_keys()
    }

    // == Optimize ==
    /// Requests a background compaction. Returns None if one is already running.
    pub fn optimize(&self) -> Option<tokio::task::JoinHandle<()>> {
        crate::tasks::spawn_compaction_task(self.clone())
    }

    // == Size ==
    pub async fn size(&self) -> usize {
        self.inner.storage.read().await.index.len()
    }

    // == Statistics ==
    pub async fn statistics(&self) -> DiskCacheStats {
        let storage = self.inner.storage.read().await;

        DiskCacheStats {
            cache_name: self.cache_name().to_string(),
            entry_count: storage.index.len(),
            data_file_length: storage.data_file.length(),
            compaction_count: self.inner.remove_count.load(Ordering::Relaxed),
            times_compacted: self.inner.times_optimized.load(Ordering::Relaxed),
            recycle_count: self.inner.recycle_count.load(Ordering::Relaxed),
            recycle_bin_size: storage.recycle.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            alive: self.is_alive(),
        }
    }

    // == Dispose ==
    /// Compacts, closes the files and marks the region dead.
    ///
    /// Runs on its own task and waits at most the configured dispose timeout;
    /// past that the region is marked dead while the task finishes on its own.
    pub async fn dispose(&self) -> Result<()> {
        let timeout = self.inner.config.dispose_timeout();
        let cache = self.clone();
        let handle = tokio::spawn(async move { cache.dispose_internal().await });

        let outcome = tokio::time::timeout(timeout, handle).await;
        self.inner.alive.store(false, Ordering::Release);

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                error!("Dispose task for {} failed: {}", self.cache_name(), join_err);
                Err(DiskCacheError::Io(std::io::Error::other(join_err.to_string())))
            }
            Err(_) => {
                warn!(
                    "Dispose of {} did not finish within {:?}, marking dead anyway",
                    self.cache_name(),
                    timeout
                );
                Ok(())
            }
        }
    }

    async fn dispose_internal(&self) -> Result<()> {
        let mut storage = self.inner.storage.write().await;
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            debug!("Already disposed, cacheName: {}", self.cache_name());
            return Ok(());
        }

        let compacted = if !self.is_alive() {
            // Dispose timed out before this task got the lock
            info!(
                "Region {} already marked dead, closing without compacting",
                self.cache_name()
            );
            false
        } else if self.begin_optimizing() {
            let result = self.optimize_file(&mut storage);
            self.finish_optimizing();
            match result {
                Ok(()) => true,
                Err(e) => {
                    error!("Compaction on dispose of {} failed: {}", self.cache_name(), e);
                    false
                }
            }
        } else {
            info!(
                "Compaction already running for {}, closing without compacting",
                self.cache_name()
            );
            false
        };

        if !compacted {
            if let Err(e) = storage.save_keys() {
                error!("Failure saving keys in dispose of {}: {}", self.cache_name(), e);
            }
        }

        warn!("Closing files, base filename: {}", self.cache_name());
        let closed = storage.close();
        self.inner.alive.store(false, Ordering::Release);

        closed.map_err(|e| {
            error!("Failure closing files in dispose of {}: {}", self.cache_name(), e);
            e
        })
    }

    /// Claims the single-flight compaction guard.
    pub(crate) fn begin_optimizing(&self) -> bool {
        self.inner
            .optimizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish_optimizing(&self) {
        self.inner.remove_count.store(0, Ordering::Release);
        self.inner.optimizing.store(false, Ordering::Release);
    }

    pub fn is_optimizing(&self) -> bool {
        self.inner.optimizing.load(Ordering::Acquire)
    }
}
