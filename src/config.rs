//! Configuration Module
//!
//! Handles loading and validating disk region configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DiskCacheError, Result};

/// Disk region configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Region name, used as the stem of the `.data` and `.key` files
    pub cache_name: String,
    /// Directory holding the region files
    pub disk_path: PathBuf,
    /// Maximum number of keys held by the key index
    pub max_key_size: usize,
    /// Maximum number of free slots held by the recycle bin
    pub max_recycle_bin_size: usize,
    /// Removals that trigger a background compaction, 0 disables
    pub optimize_at_remove_count: usize,
    /// Upper bound on the time `dispose` waits for compaction and close
    pub dispose_timeout_secs: u64,
    /// Interval of the periodic key file save, 0 disables
    pub key_save_interval_secs: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl DiskCacheConfig {
    /// Creates a new config for `cache_name` under `disk_path` with default tuning.
    pub fn new(cache_name: impl Into<String>, disk_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_name: cache_name.into(),
            disk_path: disk_path.into(),
            ..Self::default()
        }
    }

    /// Creates a new config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Region name (default: default)
    /// - `DISK_PATH` - Directory for region files (default: ./cache-data)
    /// - `MAX_KEY_SIZE` - Key index capacity (default: 5000)
    /// - `MAX_RECYCLE_BIN_SIZE` - Recycle bin capacity (default: MAX_KEY_SIZE)
    /// - `OPTIMIZE_AT_REMOVE_COUNT` - Removals before compaction (default: 0, off)
    /// - `DISPOSE_TIMEOUT_SECS` - Shutdown bound in seconds (default: 60)
    /// - `KEY_SAVE_INTERVAL_SECS` - Key save frequency in seconds (default: 0, off)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_key_size = parse_var("MAX_KEY_SIZE").unwrap_or(defaults.max_key_size);

        Self {
            cache_name: env::var("CACHE_NAME").unwrap_or(defaults.cache_name),
            disk_path: env::var("DISK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.disk_path),
            max_key_size,
            max_recycle_bin_size: parse_var("MAX_RECYCLE_BIN_SIZE").unwrap_or(max_key_size),
            optimize_at_remove_count: parse_var("OPTIMIZE_AT_REMOVE_COUNT")
                .unwrap_or(defaults.optimize_at_remove_count),
            dispose_timeout_secs: parse_var("DISPOSE_TIMEOUT_SECS")
                .unwrap_or(defaults.dispose_timeout_secs),
            key_save_interval_secs: parse_var("KEY_SAVE_INTERVAL_SECS")
                .unwrap_or(defaults.key_save_interval_secs),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache_name.is_empty() {
            return Err(DiskCacheError::InvalidConfig(
                "cache_name cannot be empty".to_string(),
            ));
        }
        if self.cache_name.contains(['/', '\\']) {
            return Err(DiskCacheError::InvalidConfig(format!(
                "cache_name '{}' must not contain path separators",
                self.cache_name
            )));
        }
        if self.max_key_size == 0 {
            return Err(DiskCacheError::InvalidConfig(
                "max_key_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the record store.
    pub fn data_file_path(&self) -> PathBuf {
        self.disk_path.join(format!("{}.data", self.cache_name))
    }

    /// Path of the key index snapshot.
    pub fn key_file_path(&self) -> PathBuf {
        self.disk_path.join(format!("{}.key", self.cache_name))
    }

    /// Path of the transient compaction target.
    pub fn temp_data_file_path(&self) -> PathBuf {
        self.disk_path.join(format!("{}Temp.data", self.cache_name))
    }

    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_secs(self.dispose_timeout_secs)
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            cache_name: "default".to_string(),
            disk_path: PathBuf::from("./cache-data"),
            max_key_size: 5000,
            max_recycle_bin_size: 5000,
            optimize_at_remove_count: 0,
            dispose_timeout_secs: 60,
            key_save_interval_secs: 0,
            server_port: 3000,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
