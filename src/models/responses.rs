//! Response DTOs for the disk cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::cache::{CacheElement, DiskCacheStats};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    /// The stored value, lossily decoded as UTF-8
    pub value: String,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
    pub max_life: Option<u64>,
}

impl GetResponse {
    pub fn from_element(key: impl Into<String>, element: &CacheElement) -> Self {
        Self {
            key: key.into(),
            value: String::from_utf8_lossy(&element.value).into_owned(),
            created_at: element.attributes.created_at,
            max_life: element.attributes.max_life_secs,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for key and group removals
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    /// Key, hierarchy prefix or group that was removed
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("'{}' removed successfully", key),
            key,
        }
    }
}

/// Response body for GET /group/:group/keys
#[derive(Debug, Clone, Serialize)]
pub struct GroupKeysResponse {
    pub group: String,
    /// Attribute names, sorted
    pub keys: BTreeSet<String>,
}

impl GroupKeysResponse {
    pub fn new(group: impl Into<String>, keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            group: group.into(),
            keys: keys.into_iter().collect(),
        }
    }
}

/// Response body for POST /optimize
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeResponse {
    /// False if a compaction was already running
    pub started: bool,
    pub message: String,
}

impl OptimizeResponse {
    pub fn new(started: bool) -> Self {
        let message = if started {
            "Compaction started"
        } else {
            "Compaction already in progress"
        };
        Self {
            started,
            message: message.to_string(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: DiskCacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<DiskCacheStats> for StatsResponse {
    fn from(stats: DiskCacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" while the region is alive, "disposed" afterwards
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self::with_status("healthy")
    }

    pub fn disposed() -> Self {
        Self::with_status("disposed")
    }

    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;

    #[test]
    fn test_get_response_from_element() {
        let element = CacheElement::new("region", CacheKey::name("test_key"), "test_value");
        let resp = GetResponse::from_element("test_key", &element);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("test_key"));
        assert!(json.contains("test_value"));
        assert!(json.contains("created_at"));
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_group_keys_sorted() {
        let resp = GroupKeysResponse::new("user1", vec!["b".to_string(), "a".to_string()]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["keys"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_optimize_response_message() {
        assert!(OptimizeResponse::new(true).message.contains("started"));
        assert!(OptimizeResponse::new(false).message.contains("already"));
    }

    #[test]
    fn test_stats_response_flattens_counters() {
        let stats = DiskCacheStats {
            hits: 8,
            misses: 2,
            entry_count: 5,
            ..Default::default()
        };
        let json = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert_eq!(json["entry_count"], 5);
        assert!((json["hit_rate"].as_f64().unwrap() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::healthy()).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert_eq!(HealthResponse::disposed().status, "disposed");
    }
}
