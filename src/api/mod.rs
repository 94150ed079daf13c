//! API Module
//!
//! HTTP handlers and routing over one disk region.
//!
//! # Endpoints
//! - `PUT /set` - Store a value under a key or group attribute
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Remove a key, or a whole name hierarchy if it ends in `:`
//! - `GET /group/:group/keys` - List the attribute names of a group
//! - `GET /group/:group/get/:attr` - Retrieve a group attribute
//! - `DELETE /group/:group` - Remove every attribute of a group
//! - `DELETE /all` - Empty the region
//! - `POST /optimize` - Start a background compaction
//! - `GET /stats` - Get region statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
