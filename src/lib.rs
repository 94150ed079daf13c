//! Indexed Disk Cache - a disk tier for a composite cache
//!
//! Stores serialized elements in one data file per region, tracks their
//! locations in a bounded LRU key index, reuses freed slots and compacts
//! the file in the background.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::IndexedDiskCache;
pub use config::DiskCacheConfig;
pub use error::{DiskCacheError, Result};
pub use tasks::{spawn_compaction_task, spawn_key_save_task};
