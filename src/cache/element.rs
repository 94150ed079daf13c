//! Cache Element Module
//!
//! Defines the keys and elements handed to the disk tier by the composite cache.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::NAME_COMPONENT_DELIMITER;

// == Group Identity ==
/// Identifies a group of attributes within one cache region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId {
    pub cache_name: String,
    pub group_name: String,
}

impl GroupId {
    pub fn new(cache_name: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            group_name: group_name.into(),
        }
    }
}

/// Key of a single attribute stored inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupAttrName {
    pub group_id: GroupId,
    pub attr_name: String,
}

// == Cache Key ==
/// Key of an element stored on disk.
///
/// Plain names may form a hierarchy with [`NAME_COMPONENT_DELIMITER`];
/// a name ending in the delimiter addresses every key below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Name(String),
    Group(GroupAttrName),
}

impl CacheKey {
    pub fn name(name: impl Into<String>) -> Self {
        CacheKey::Name(name.into())
    }

    pub fn group(group_id: GroupId, attr_name: impl Into<String>) -> Self {
        CacheKey::Group(GroupAttrName {
            group_id,
            attr_name: attr_name.into(),
        })
    }

    /// Returns the hierarchy prefix if this key addresses a whole name hierarchy.
    pub fn hierarchy_prefix(&self) -> Option<&str> {
        match self {
            CacheKey::Name(name) if name.ends_with(NAME_COMPONENT_DELIMITER) => Some(name),
            _ => None,
        }
    }

    /// Checks whether this key lives under the given hierarchy prefix.
    pub fn is_under(&self, prefix: &str) -> bool {
        matches!(self, CacheKey::Name(name) if name.starts_with(prefix))
    }

    /// Returns the group attribute name if this key belongs to `group_id`.
    pub fn attr_in_group(&self, group_id: &GroupId) -> Option<&str> {
        match self {
            CacheKey::Group(attr) if &attr.group_id == group_id => Some(&attr.attr_name),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Name(name) => write!(f, "{}", name),
            CacheKey::Group(attr) => write!(
                f,
                "[{}:{}]{}",
                attr.group_id.cache_name, attr.group_id.group_name, attr.attr_name
            ),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(name: &str) -> Self {
        CacheKey::Name(name.to_string())
    }
}

// == Element Attributes ==
/// Cache metadata carried with an element. The disk tier stores it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttributes {
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Maximum life in seconds, None = eternal
    pub max_life_secs: Option<u64>,
}

impl ElementAttributes {
    pub fn new(max_life_secs: Option<u64>) -> Self {
        Self {
            created_at: chrono::Utc::now().timestamp_millis(),
            max_life_secs,
        }
    }

    pub fn is_eternal(&self) -> bool {
        self.max_life_secs.is_none()
    }
}

impl Default for ElementAttributes {
    fn default() -> Self {
        Self::new(None)
    }
}

// == Cache Element ==
/// A key, an opaque value and its metadata, as supplied by the composite cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheElement {
    pub cache_name: String,
    pub key: CacheKey,
    pub value: Vec<u8>,
    pub attributes: ElementAttributes,
}

impl CacheElement {
    pub fn new(cache_name: impl Into<String>, key: CacheKey, value: impl Into<Vec<u8>>) -> Self {
        Self {
            cache_name: cache_name.into(),
            key,
            value: value.into(),
            attributes: ElementAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: ElementAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Encodes the element into the bytes stored as one record.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes a record read back from the data file.
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
