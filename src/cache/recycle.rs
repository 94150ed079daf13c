//! Recycle Bin Module
//!
//! Best-fit free list of record slots, ordered by length.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cache::descriptor::RecordDescriptor;
use crate::cache::index::EvictionListener;
use crate::cache::CacheKey;

// == Recycle Bin ==
/// Free record slots keyed by length.
///
/// `reserve` hands out the smallest slot that fits. The bin is bounded: once
/// full, a released slot only gets in by displacing a smaller one, and
/// whichever loses becomes a disk orphan until the next compaction.
#[derive(Debug)]
pub struct RecycleBin {
    /// Length -> slots of that length
    slots: BTreeMap<u32, Vec<RecordDescriptor>>,
    /// Number of slots held across all lengths
    count: usize,
    /// Maximum number of slots held
    capacity: usize,
}

impl RecycleBin {
    // == Constructor ==
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            count: 0,
            capacity,
        }
    }

    // == Reserve ==
    /// Removes and returns the smallest slot whose length is at least `min_length`.
    pub fn reserve(&mut self, min_length: u32) -> Option<RecordDescriptor> {
        let length = *self.slots.range(min_length..).next()?.0;
        self.take_one(length)
    }

    // == Release ==
    /// Returns a freed slot to the pool.
    ///
    /// Returns false if the slot was dropped because the bin is full of
    /// larger slots.
    pub fn release(&mut self, descriptor: RecordDescriptor) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self.count >= self.capacity {
            let smallest = match self.slots.keys().next() {
                Some(&length) => length,
                None => return false,
            };
            if descriptor.length() <= smallest {
                debug!(
                    "Recycle bin full, dropping slot at {} ({} bytes)",
                    descriptor.offset(),
                    descriptor.length()
                );
                return false;
            }
            if let Some(dropped) = self.take_one(smallest) {
                debug!(
                    "Recycle bin full, displacing slot at {} ({} bytes)",
                    dropped.offset(),
                    dropped.length()
                );
            }
        }

        self.slots
            .entry(descriptor.length())
            .or_default()
            .push(descriptor);
        self.count += 1;
        true
    }

    fn take_one(&mut self, length: u32) -> Option<RecordDescriptor> {
        let bucket = self.slots.get_mut(&length)?;
        let descriptor = bucket.pop();
        if bucket.is_empty() {
            self.slots.remove(&length);
        }
        if descriptor.is_some() {
            self.count -= 1;
        }
        descriptor
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes held by free slots.
    pub fn free_bytes(&self) -> u64 {
        self.slots
            .iter()
            .map(|(length, bucket)| u64::from(*length) * bucket.len() as u64)
            .sum()
    }
}

// Evicted index entries go straight back into the pool.
impl EvictionListener for RecycleBin {
    fn on_evict(&mut self, key: CacheKey, descriptor: RecordDescriptor) {
        debug!(
            "Recycling evicted key '{}' at {} ({} bytes)",
            key,
            descriptor.offset(),
            descriptor.length()
        );
        self.release(descriptor);
    }
}
