//! Cache Module
//!
//! Indexed disk tier: records live in one data file, their locations in an
//! LRU key index persisted to a key file, and freed slots in a recycle bin.

mod compaction;
mod descriptor;
mod disk;
mod element;
mod index;
mod recycle;
mod stats;
mod store;


// Re-export public types
pub use descriptor::RecordDescriptor;
pub use disk::IndexedDisk;
pub use element::{CacheElement, CacheKey, ElementAttributes, GroupAttrName, GroupId};
pub use index::{DiscardEvicted, EvictionListener, KeyIndex};
pub use recycle::RecycleBin;
pub use stats::DiskCacheStats;
pub use store::IndexedDiskCache;

// == Public Constants ==
/// Separates the components of a hierarchical name; a name ending in it
/// addresses every key below it.
pub const NAME_COMPONENT_DELIMITER: &str = ":";
