//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against a region in a
//! temporary directory.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use indexed_disk_cache::{api::create_router, AppState, DiskCacheConfig};
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> (TempDir, AppState, Router) {
    let dir = tempdir().unwrap();
    let state = AppState::from_config(&DiskCacheConfig::new("region", dir.path())).unwrap();
    let app = create_router(state.clone());
    (dir, state, app)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn set(app: &Router, body: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (_dir, _state, app) = create_test_app();

    let response = set(&app, r#"{"key":"test_key","value":"test_value"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_with_max_life() {
    let (_dir, _state, app) = create_test_app();

    let response = set(&app, r#"{"key":"k","value":"v","max_life":60}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/get/k").await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["max_life"], 60);
}

#[tokio::test]
async fn test_set_endpoint_empty_key() {
    let (_dir, _state, app) = create_test_app();

    let response = set(&app, r#"{"key":"","value":"v"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("Key cannot be empty"));
}

#[tokio::test]
async fn test_set_endpoint_invalid_json() {
    let (_dir, _state, app) = create_test_app();

    let response = set(&app, r#"{"key": "missing value"}"#).await;
    assert!(response.status().is_client_error());
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_returns_stored_value() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"greeting","value":"hello disk"}"#).await;

    let response = send(&app, "GET", "/get/greeting").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "greeting");
    assert_eq!(json["value"], "hello disk");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (_dir, _state, app) = create_test_app();

    let response = send(&app, "GET", "/get/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_get_endpoint_latest_value_wins() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"k","value":"a much longer first value"}"#).await;
    set(&app, r#"{"key":"k","value":"short"}"#).await;

    let response = send(&app, "GET", "/get/k").await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "short");
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"to_delete","value":"v"}"#).await;

    let response = send(&app, "DELETE", "/del/to_delete").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/get/to_delete").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let (_dir, _state, app) = create_test_app();

    let response = send(&app, "DELETE", "/del/nothing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_hierarchy() {
    let (_dir, _state, app) = create_test_app();
    for key in ["user:1", "user:2", "order:1"] {
        let body = format!(r#"{{"key":"{}","value":"v"}}"#, key);
        set(&app, &body).await;
    }

    let response = send(&app, "DELETE", "/del/user:").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(send(&app, "GET", "/get/user:1").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/get/user:2").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&app, "GET", "/get/order:1").await.status(), StatusCode::OK);
}

// == Group Endpoint Tests ==

#[tokio::test]
async fn test_group_keys_and_removal() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"name","value":"Ada","group":"user1"}"#).await;
    set(&app, r#"{"key":"email","value":"ada@example.com","group":"user1"}"#).await;
    set(&app, r#"{"key":"name","value":"Bob","group":"user2"}"#).await;

    let response = send(&app, "GET", "/group/user1/keys").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["keys"], serde_json::json!(["email", "name"]));

    let response = send(&app, "GET", "/group/user1/get/name").await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "Ada");

    let response = send(&app, "DELETE", "/group/user1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(send(&app, "GET", "/group/user1/keys").await.into_body()).await;
    assert_eq!(json["keys"], serde_json::json!([]));
    let response = send(&app, "GET", "/group/user2/get/name").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_group_attr_not_confused_with_plain_key() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"name","value":"grouped","group":"user1"}"#).await;

    let response = send(&app, "GET", "/get/name").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Region Endpoint Tests ==

#[tokio::test]
async fn test_delete_all_empties_region() {
    let (_dir, state, app) = create_test_app();
    set(&app, r#"{"key":"a","value":"1"}"#).await;
    set(&app, r#"{"key":"b","value":"2"}"#).await;

    let response = send(&app, "DELETE", "/all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.cache.size().await, 0);
}

#[tokio::test]
async fn test_optimize_endpoint_compacts() {
    let (_dir, state, app) = create_test_app();
    for i in 0..10 {
        let body = format!(r#"{{"key":"k{}","value":"value {}"}}"#, i, i);
        set(&app, &body).await;
    }
    for i in 0..5 {
        send(&app, "DELETE", &format!("/del/k{}", i)).await;
    }

    let response = send(&app, "POST", "/optimize").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["started"], true);

    for _ in 0..100 {
        if state.cache.statistics().await.times_compacted == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(state.cache.statistics().await.times_compacted, 1);
    assert_eq!(send(&app, "GET", "/get/k7").await.status(), StatusCode::OK);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint_counts() {
    let (_dir, _state, app) = create_test_app();
    set(&app, r#"{"key":"a","value":"1"}"#).await;
    send(&app, "GET", "/get/a").await;
    send(&app, "GET", "/get/missing").await;

    let response = send(&app, "GET", "/stats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache_name"], "region");
    assert_eq!(json["entry_count"], 1);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
    assert_eq!(json["alive"], true);
    assert!(json["data_file_length"].as_u64().unwrap() > 0);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, _state, app) = create_test_app();

    let response = send(&app, "GET", "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_disposed_region_is_unavailable() {
    let (_dir, state, app) = create_test_app();
    state.cache.dispose().await.unwrap();

    let response = send(&app, "GET", "/get/a").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let response = set(&app, r#"{"key":"a","value":"1"}"#).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_to_json(send(&app, "GET", "/health").await.into_body()).await;
    assert_eq!(json["status"], "disposed");
}
