//! HTTP API routes for the Inlet sync server
//!
//! Each route maps to one message on the caller's user actor; method
//! constraints live in the route table (axum answers wrong verbs with 405
//! and unknown paths with 404). Payload shape is enforced by the Json
//! extractors before anything reaches an actor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ractor::ActorRef;
use serde_json::json;
use std::sync::Arc;

pub mod account;
pub mod ingest;
pub mod sync;

use crate::actors::user_sync::UserSyncMsg;
use crate::app_state::AppState;
use crate::supervisor::UserSupervisorMsg;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Account routes
        .route("/user/{user_id}/init", post(account::init_user))
        .route("/user/{user_id}/profile", get(account::get_profile))
        .route("/user/{user_id}/cleanup", post(account::cleanup_user))
        // Sync protocol routes
        .route("/user/{user_id}/push", post(sync::push))
        .route("/user/{user_id}/pull", post(sync::pull))
        // Ingestion route (called by the fetch pipeline, not by clients)
        .route("/user/{user_id}/ingest", post(ingest::ingest))
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let active_users = match state.app_state.ensure_supervisor().await {
        Ok(supervisor) => {
            match ractor::call!(supervisor, |reply| UserSupervisorMsg::GetHealth { reply }) {
                Ok(health) => health.active_users,
                Err(_) => 0,
            }
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "error": e
                })),
            )
                .into_response()
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "inlet",
            "version": "0.1.0",
            "active_users": active_users
        })),
    )
        .into_response()
}

/// The caller supplies the user identity; the actor trusts it, so the only
/// guard here is syntactic (and keeps path traversal out of db filenames).
fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 128
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Validate the path user id and resolve its actor, or produce the error
/// response to return as-is.
pub(crate) async fn resolve_user_actor(
    state: &ApiState,
    user_id: &str,
) -> Result<ActorRef<UserSyncMsg>, Response> {
    if !valid_user_id(user_id) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid user id"})),
        )
            .into_response());
    }

    state.app_state.user_actor(user_id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Actor error: {}", e)})),
        )
            .into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_id() {
        assert!(valid_user_id("user-1"));
        assert!(valid_user_id("a.b_c-d42"));
        assert!(!valid_user_id(""));
        assert!(!valid_user_id("../escape"));
        assert!(!valid_user_id("user 1"));
        assert!(!valid_user_id(&"x".repeat(200)));
    }
}
