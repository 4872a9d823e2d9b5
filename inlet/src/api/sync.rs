//! Push and pull endpoints for the client sync protocol.
//!
//! A mutation failure is a protocol-level outcome, not a transport error:
//! it travels in the response body so the client library can surface it and
//! decide what to do with its local queue.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::{PullRequest, PushRequest};

use crate::actors::user_sync::{SyncError, UserSyncMsg};
use crate::api::{resolve_user_actor, ApiState};

pub async fn push(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<PushRequest>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::Push { request, reply }) {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({}))).into_response(),
        Ok(Err(e @ SyncError::MutationFailed { .. })) => {
            (StatusCode::OK, Json(json!({"error": e.to_string()}))).into_response()
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Actor error: {}", e)})),
        )
            .into_response(),
    }
}

pub async fn pull(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<PullRequest>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::Pull { request, reply }) {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Actor error: {}", e)})),
        )
            .into_response(),
    }
}
