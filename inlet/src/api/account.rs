//! Account endpoints: init, profile, and destructive cleanup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::Profile;

use crate::actors::user_sync::UserSyncMsg;
use crate::api::{resolve_user_actor, ApiState};

/// Initialize (or update) the account. Opening the actor already ran any
/// pending migrations; this reports what happened and stores the profile.
pub async fn init_user(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
    Json(profile): Json<Profile>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::Init { profile, reply }) {
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

pub async fn get_profile(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::GetProfile { reply }) {
        Ok(Ok(profile)) => (StatusCode::OK, Json(json!({"profile": profile}))).into_response(),
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

/// Account deletion. Destructive and idempotent.
pub async fn cleanup_user(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::Cleanup { reply }) {
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
