//! HTTP API Integration Tests
//!
//! Tests full request/response cycles for the sync endpoints, including
//! on-disk persistence across server instances.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

use inlet::api;
use inlet::app_state::AppState;
use inlet::supervisor::StoreRoot;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_app_at(data_dir: &Path) -> axum::Router {
    let app_state = Arc::new(AppState::new(StoreRoot::Dir(data_dir.to_path_buf()), false));
    api::router().with_state(api::ApiState { app_state })
}

fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let app = test_app_at(temp_dir.path());
    (app, temp_dir)
}

fn test_user_id() -> String {
    format!("test-user-{}", uuid::Uuid::new_v4())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

fn add_source_push(source_id: &str) -> Value {
    json!({
        "clientGroupId": "group-1",
        "mutations": [{
            "id": 1,
            "clientId": "client-a",
            "name": "addSource",
            "args": {
                "source": {
                    "id": source_id,
                    "provider": "YOUTUBE",
                    "providerId": "UC1",
                    "name": "Chan"
                }
            }
        }]
    })
}

// ============================================================================
// Health & Routing
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _temp_dir) = setup_test_app();

    let (status, body) = json_response(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "inlet");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _temp_dir) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/user/u1/nope"))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let (app, _temp_dir) = setup_test_app();

    // push is a mutating route; reads are not accepted
    let response = app
        .clone()
        .oneshot(get("/user/u1/push"))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_invalid_user_id_is_rejected() {
    let (app, _temp_dir) = setup_test_app();

    let (status, body) = json_response(
        &app,
        post_json("/user/bad,id/pull", json!({"clientGroupId": "g"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid user id");
}

// ============================================================================
// Account Lifecycle
// ============================================================================

#[tokio::test]
async fn test_init_reports_schema_and_migrations() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    let (status, body) = json_response(&app, post_json(&format!("/user/{user_id}/init"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["schemaVersion"].as_i64().unwrap() > 0);
    assert_eq!(
        body["migrationsApplied"].as_array().unwrap().len() as i64,
        body["schemaVersion"].as_i64().unwrap()
    );
    assert_eq!(body["profileUpdated"], false);
}

#[tokio::test]
async fn test_profile_round_trip() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    let (_, body) = json_response(&app, get(&format!("/user/{user_id}/profile"))).await;
    assert!(body["profile"].is_null());

    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/init"),
            json!({"id": user_id, "email": "ada@lovelace.test", "givenName": "Ada"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profileUpdated"], true);

    let (status, body) = json_response(&app, get(&format!("/user/{user_id}/profile"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["email"], "ada@lovelace.test");
    assert_eq!(body["profile"]["givenName"], "Ada");
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    json_response(
        &app,
        post_json(&format!("/user/{user_id}/push"), add_source_push("src-1")),
    )
    .await;
    json_response(
        &app,
        post_json(&format!("/user/{user_id}/init"), json!({"email": "a@b.test"})),
    )
    .await;

    let (status, body) =
        json_response(&app, post_json(&format!("/user/{user_id}/cleanup"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["tablesCleared"]
        .as_array()
        .unwrap()
        .contains(&json!("sources")));

    let (_, body) = json_response(&app, get(&format!("/user/{user_id}/profile"))).await;
    assert!(body["profile"].is_null());

    let (_, body) = json_response(
        &app,
        post_json(&format!("/user/{user_id}/pull"), json!({"clientGroupId": "g"})),
    )
    .await;
    assert_eq!(body["cookie"]["version"], 0);
    assert_eq!(body["patch"].as_array().unwrap().len(), 1);
    assert_eq!(body["patch"][0]["op"], "clear");
}

// ============================================================================
// Sync Protocol over HTTP
// ============================================================================

#[tokio::test]
async fn test_full_sync_flow() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    // Subscribe to a source
    let (status, body) = json_response(
        &app,
        post_json(&format!("/user/{user_id}/push"), add_source_push("src-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    // The fetch pipeline delivers one video
    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/ingest"),
            json!({
                "sourceId": "src-1",
                "items": [{"providerItemId": "v1", "contentType": "VIDEO", "title": "T"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ingested": 1, "skipped": 0, "errors": []}));

    // Pull the snapshot and find the user item
    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/pull"),
            json!({"clientGroupId": "group-1", "cookie": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let patch = body["patch"].as_array().unwrap();
    assert_eq!(patch[0]["op"], "clear");
    let user_item = patch
        .iter()
        .find(|op| {
            op["op"] == "put"
                && op["key"]
                    .as_str()
                    .is_some_and(|key| key.starts_with("userItem/"))
        })
        .expect("patch contains the ingested user item");
    assert_eq!(user_item["value"]["state"], "INBOX");
    let user_item_id = user_item["value"]["id"].as_str().unwrap();

    // Bookmark it from the client
    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/push"),
            json!({
                "clientGroupId": "group-1",
                "mutations": [{
                    "id": 2,
                    "clientId": "client-a",
                    "name": "bookmarkItem",
                    "args": {"userItemId": user_item_id}
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    // The next pull reflects the bookmark and prunes the client queue
    let (_, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/pull"),
            json!({"clientGroupId": "group-1", "cookie": null}),
        ),
    )
    .await;
    let patch = body["patch"].as_array().unwrap();
    let user_item = patch
        .iter()
        .find(|op| {
            op["key"]
                .as_str()
                .is_some_and(|key| key.starts_with("userItem/"))
        })
        .unwrap();
    assert_eq!(user_item["value"]["state"], "BOOKMARKED");
    assert_eq!(body["lastMutationIdChanges"]["client-a"], 2);
}

#[tokio::test]
async fn test_push_mutation_failure_is_reported_in_band() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/push"),
            json!({
                "clientGroupId": "group-1",
                "mutations": [{
                    "id": 1,
                    "clientId": "client-a",
                    "name": "bookmarkItem",
                    "args": {"userItemId": "missing"}
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("mutation 1 failed:"), "got: {error}");
}

#[tokio::test]
async fn test_ingest_unknown_source_is_404() {
    let (app, _temp_dir) = setup_test_app();
    let user_id = test_user_id();

    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/ingest"),
            json!({
                "sourceId": "ghost",
                "items": [{"providerItemId": "v1", "contentType": "VIDEO"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "source not found: ghost");
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_state_survives_a_server_restart() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let user_id = test_user_id();

    {
        let app = test_app_at(temp_dir.path());
        let (status, _) = json_response(
            &app,
            post_json(&format!("/user/{user_id}/push"), add_source_push("src-1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // A fresh supervisor on the same data dir sees the committed state,
    // and the migration ledger keeps init from re-running anything.
    let app = test_app_at(temp_dir.path());
    let (_, body) = json_response(&app, post_json(&format!("/user/{user_id}/init"), json!({}))).await;
    assert_eq!(body["migrationsApplied"].as_array().unwrap().len(), 0);

    let (_, body) = json_response(
        &app,
        post_json(
            &format!("/user/{user_id}/pull"),
            json!({"clientGroupId": "group-1"}),
        ),
    )
    .await;
    assert_eq!(body["cookie"]["version"], 1);
    let patch = body["patch"].as_array().unwrap();
    assert!(patch
        .iter()
        .any(|op| op["key"].as_str().is_some_and(|key| key.starts_with("source/"))));
}
