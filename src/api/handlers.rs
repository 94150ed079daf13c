//! API Handlers
//!
//! HTTP request handlers for each disk cache endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheKey, GroupId, IndexedDiskCache};
use crate::config::DiskCacheConfig;
use crate::error::{DiskCacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, GroupKeysResponse, HealthResponse, OptimizeResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The region handle is itself shared and synchronized, so no extra lock.
#[derive(Clone)]
pub struct AppState {
    pub cache: IndexedDiskCache,
}

impl AppState {
    pub fn new(cache: IndexedDiskCache) -> Self {
        Self { cache }
    }

    /// Opens the region described by `config`.
    pub fn from_config(config: &DiskCacheConfig) -> Result<Self> {
        Ok(Self::new(IndexedDiskCache::open(config.clone())?))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.cache.is_alive() {
            Ok(())
        } else {
            Err(DiskCacheError::NotAlive(self.cache.cache_name().to_string()))
        }
    }

    fn group_id(&self, group: &str) -> GroupId {
        GroupId::new(self.cache.cache_name(), group)
    }
}

/// Handler for PUT /set
///
/// Stores a value under a plain key, or under a group attribute when
/// `group` is given.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(DiskCacheError::InvalidRequest(error_msg));
    }

    let key = req.key.clone();
    let element = req.into_element(state.cache.cache_name());
    state.cache.put(&element).await?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    state.ensure_alive()?;

    match state.cache.get(&CacheKey::name(key.as_str())).await? {
        Some(element) => Ok(Json(GetResponse::from_element(key, &element))),
        None => Err(DiskCacheError::NotFound(key)),
    }
}

/// Handler for GET /group/:group/get/:attr
pub async fn get_group_attr_handler(
    State(state): State<AppState>,
    Path((group, attr)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    state.ensure_alive()?;

    let key = CacheKey::group(state.group_id(&group), attr.as_str());
    match state.cache.get(&key).await? {
        Some(element) => Ok(Json(GetResponse::from_element(attr, &element))),
        None => Err(DiskCacheError::NotFound(key.to_string())),
    }
}

/// Handler for DELETE /del/:key
///
/// A key ending in the name delimiter removes every key below it.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.ensure_alive()?;

    if state.cache.remove(&CacheKey::name(key.as_str())).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(DiskCacheError::NotFound(key))
    }
}

/// Handler for GET /group/:group/keys
pub async fn group_keys_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<GroupKeysResponse>> {
    state.ensure_alive()?;

    let keys = state.cache.get_group_keys(&group).await;
    Ok(Json(GroupKeysResponse::new(group, keys)))
}

/// Handler for DELETE /group/:group
pub async fn delete_group_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.ensure_alive()?;

    if state.cache.remove_group(&state.group_id(&group)).await {
        Ok(Json(DeleteResponse::new(group)))
    } else {
        Err(DiskCacheError::NotFound(group))
    }
}

/// Handler for DELETE /all
pub async fn delete_all_handler(State(state): State<AppState>) -> Result<Json<DeleteResponse>> {
    state.cache.remove_all().await?;
    Ok(Json(DeleteResponse::new(state.cache.cache_name())))
}

/// Handler for POST /optimize
///
/// Starts a background compaction and returns without waiting for it.
pub async fn optimize_handler(State(state): State<AppState>) -> Result<Json<OptimizeResponse>> {
    state.ensure_alive()?;

    let started = state.cache.optimize().is_some();
    Ok(Json(OptimizeResponse::new(started)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.statistics().await))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    if state.cache.is_alive() {
        Json(HealthResponse::healthy())
    } else {
        Json(HealthResponse::disposed())
    }
}
