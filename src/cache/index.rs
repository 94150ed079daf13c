//! Key Index Module
//!
//! Bounded map from cache key to record descriptor with least recently used eviction.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cache::descriptor::RecordDescriptor;
use crate::cache::CacheKey;

// == Eviction Listener ==
/// Receives every entry the index drops for capacity.
///
/// Called synchronously from [`KeyIndex::insert`], before the insert returns.
pub trait EvictionListener {
    fn on_evict(&mut self, key: CacheKey, descriptor: RecordDescriptor);
}

/// Listener that lets evicted descriptors go. Used for scratch indexes whose
/// slots have no recycle bin.
#[derive(Debug, Default)]
pub struct DiscardEvicted;

impl EvictionListener for DiscardEvicted {
    fn on_evict(&mut self, _key: CacheKey, _descriptor: RecordDescriptor) {}
}

#[derive(Debug)]
struct Slot {
    descriptor: RecordDescriptor,
    stamp: u64,
}

// == Key Index ==
/// Maps keys to record descriptors and remembers insertion order.
///
/// Order is recency for eviction: every insert moves its key to the newest
/// end; lookups do not, since they run under a shared lock.
/// - `order` front = least recently inserted
/// - `order` back = most recently inserted
#[derive(Debug)]
pub struct KeyIndex {
    /// Key -> descriptor and recency stamp
    entries: HashMap<CacheKey, Slot>,
    /// Recency stamp -> key
    order: BTreeMap<u64, CacheKey>,
    next_stamp: u64,
    max_entries: usize,
}

impl KeyIndex {
    // == Constructor ==
    /// Creates an empty index holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
            max_entries,
        }
    }

    // == Get ==
    pub fn get(&self, key: &CacheKey) -> Option<&RecordDescriptor> {
        self.entries.get(key).map(|slot| &slot.descriptor)
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    // == Insert ==
    /// Installs `descriptor` for `key` as the most recent entry.
    ///
    /// Returns the descriptor previously held for `key`. If the insert pushes
    /// the index over capacity, the oldest entries are handed to `listener`.
    pub fn insert(
        &mut self,
        key: CacheKey,
        descriptor: RecordDescriptor,
        listener: &mut impl EvictionListener,
    ) -> Option<RecordDescriptor> {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        let previous = self
            .entries
            .insert(key.clone(), Slot { descriptor, stamp })
            .map(|old| {
                self.order.remove(&old.stamp);
                old.descriptor
            });
        self.order.insert(stamp, key);

        while self.entries.len() > self.max_entries {
            match self.pop_oldest() {
                Some((evicted_key, evicted)) => listener.on_evict(evicted_key, evicted),
                None => break,
            }
        }

        previous
    }

    // == Remove ==
    pub fn remove(&mut self, key: &CacheKey) -> Option<RecordDescriptor> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.stamp);
        Some(slot.descriptor)
    }

    /// Removes every entry whose key matches `predicate`, returning them.
    pub fn remove_where(
        &mut self,
        mut predicate: impl FnMut(&CacheKey) -> bool,
    ) -> Vec<(CacheKey, RecordDescriptor)> {
        let matched: Vec<CacheKey> = self
            .order
            .values()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        matched
            .into_iter()
            .filter_map(|key| self.remove(&key).map(|descriptor| (key, descriptor)))
            .collect()
    }

    // == Eviction Victim ==
    /// Removes and returns the least recently inserted entry.
    pub fn pop_oldest(&mut self) -> Option<(CacheKey, RecordDescriptor)> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.entries.remove(&key)?;
        Some((key, slot.descriptor))
    }

    pub fn peek_oldest(&self) -> Option<&CacheKey> {
        self.order.values().next()
    }

    // == Iteration ==
    /// Keys from least to most recently inserted.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.order.values()
    }

    /// Entries from least to most recently inserted.
    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &RecordDescriptor)> {
        self.order
            .values()
            .filter_map(|key| self.entries.get(key).map(|slot| (key, &slot.descriptor)))
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Changes the bound, evicting the oldest entries into `listener` if over.
    pub fn set_capacity(&mut self, max_entries: usize, listener: &mut impl EvictionListener) {
        self.max_entries = max_entries;
        while self.entries.len() > self.max_entries {
            match self.pop_oldest() {
                Some((key, descriptor)) => listener.on_evict(key, descriptor),
                None => break,
            }
        }
    }

    // == Snapshot ==
    /// Encodes the whole index, oldest entry first, for the key file.
    pub fn to_snapshot(&self) -> serde_json::Result<Vec<u8>> {
        let entries: Vec<SnapshotEntryRef<'_>> = self
            .iter()
            .map(|(key, descriptor)| SnapshotEntryRef { key, descriptor })
            .collect();
        serde_json::to_vec(&entries)
    }

    /// Rebuilds an index from a key file snapshot.
    ///
    /// Entries beyond `max_entries` are evicted into `listener` as they load,
    /// so the newest entries survive.
    pub fn from_snapshot(
        bytes: &[u8],
        max_entries: usize,
        listener: &mut impl EvictionListener,
    ) -> serde_json::Result<Self> {
        let entries: Vec<SnapshotEntry> = serde_json::from_slice(bytes)?;
        let mut index = Self::new(max_entries);
        for entry in entries {
            if let Some(duplicate) = index.insert(entry.key.clone(), entry.descriptor, listener) {
                listener.on_evict(entry.key, duplicate);
            }
        }
        Ok(index)
    }
}

#[derive(Serialize)]
struct SnapshotEntryRef<'a> {
    key: &'a CacheKey,
    descriptor: &'a RecordDescriptor,
}

#[derive(Deserialize)]
struct SnapshotEntry {
    key: CacheKey,
    descriptor: RecordDescriptor,
}
