//! Ingestion endpoint, called by the external fetch pipeline.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::IngestRequest;

use crate::actors::user_sync::{SyncError, UserSyncMsg};
use crate::api::{resolve_user_actor, ApiState};

pub async fn ingest(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<IngestRequest>,
) -> Response {
    let actor = match resolve_user_actor(&state, &user_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match ractor::call!(actor, |reply| UserSyncMsg::Ingest { request, reply }) {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(outcome)).into_response(),
        Ok(Err(e @ SyncError::SourceNotFound(_))) => {
            (StatusCode::NOT_FOUND, Json(json!({"error": e.to_string()}))).into_response()
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
