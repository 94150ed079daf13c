//! Background Tasks Module
//!
//! Tasks that run alongside a disk region.
//!
//! # Tasks
//! - Compaction: rewrites the data file while the region keeps serving
//! - Key save: persists the key index at configured intervals

mod compaction;
mod key_save;

pub use compaction::spawn_compaction_task;
pub use key_save::spawn_key_save_task;
