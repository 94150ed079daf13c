//! Record Descriptor Module
//!
//! Locates one serialized record inside the data file.

use serde::{Deserialize, Serialize};

use crate::error::{DiskCacheError, Result};

// == Record Descriptor ==
/// Offset and length of a record in the data file.
///
/// Deliberately neither `Clone` nor `Copy`: a descriptor is owned either by a
/// key index entry or by the recycle bin, and only moves between the two.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    offset: u64,
    length: u32,
}

impl RecordDescriptor {
    pub fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }

    /// Builds a descriptor for `data` placed at `offset`.
    pub fn for_record(offset: u64, data: &[u8]) -> Result<Self> {
        let length =
            u32::try_from(data.len()).map_err(|_| DiskCacheError::RecordTooLarge(data.len()))?;
        Ok(Self::new(offset, length))
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// First byte past the record, or None if it lies beyond `u64::MAX`.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(u64::from(self.length))
    }
}
