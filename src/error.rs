//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Disk Cache Error Enum ==
/// Unified error type for the disk cache engine and its HTTP surface.
#[derive(Error, Debug)]
pub enum DiskCacheError {
    /// File open, read, write, rename or delete failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Element or key snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record was readable but disagrees with the index
    #[error("Corrupted record for key {key}: {reason}")]
    Corrupted { key: String, reason: String },

    /// Serialized element does not fit a record descriptor
    #[error("Record too large: {0} bytes")]
    RecordTooLarge(usize),

    /// The region has been disposed
    #[error("Disk cache not alive: {0}")]
    NotAlive(String),

    /// Key not found on disk
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for DiskCacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            DiskCacheError::NotFound(_) => StatusCode::NOT_FOUND,
            DiskCacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DiskCacheError::NotAlive(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, DiskCacheError>;
