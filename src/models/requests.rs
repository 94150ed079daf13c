//! Request DTOs for the disk cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::{CacheElement, CacheKey, ElementAttributes, GroupId};

/// Maximum accepted key and group name length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: Plain name, or the attribute name when `group` is set
/// - `value`: The value to store
/// - `group`: Optional group the attribute belongs to
/// - `max_life`: Optional max life in seconds, recorded with the element
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub max_life: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        match &self.group {
            Some(group) if group.is_empty() => Some("Group cannot be empty".to_string()),
            Some(group) if group.len() > MAX_KEY_LENGTH => Some(format!(
                "Group exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            )),
            _ => None,
        }
    }

    /// Builds the element stored for this request in region `cache_name`.
    pub fn into_element(self, cache_name: &str) -> CacheElement {
        let key = match self.group {
            Some(group) => CacheKey::group(GroupId::new(cache_name, group), self.key),
            None => CacheKey::name(self.key),
        };
        CacheElement::new(cache_name, key, self.value)
            .with_attributes(ElementAttributes::new(self.max_life))
    }
}
