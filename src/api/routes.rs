//! API Routes
//!
//! Configures the Axum router with all disk cache endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_all_handler, delete_group_handler, delete_handler, get_group_attr_handler,
    get_handler, group_keys_handler, health_handler, optimize_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/group/:group", delete(delete_group_handler))
        .route("/group/:group/keys", get(group_keys_handler))
        .route("/group/:group/get/:attr", get(get_group_attr_handler))
        .route("/all", delete(delete_all_handler))
        .route("/optimize", post(optimize_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskCacheConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tempfile::{tempdir, TempDir};
    use tower::util::ServiceExt;

    fn create_test_app() -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let state = AppState::from_config(&DiskCacheConfig::new("region", dir.path())).unwrap();
        (dir, create_router(state))
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, app) = create_test_app();
        assert_eq!(status_of(app, "GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (_dir, app) = create_test_app();
        assert_eq!(status_of(app, "GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let (_dir, app) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"test","value":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let (_dir, app) = create_test_app();
        assert_eq!(
            status_of(app, "GET", "/get/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_optimize_endpoint() {
        let (_dir, app) = create_test_app();
        assert_eq!(status_of(app, "POST", "/optimize").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_all_endpoint() {
        let (_dir, app) = create_test_app();
        assert_eq!(status_of(app, "DELETE", "/all").await, StatusCode::OK);
    }
}
