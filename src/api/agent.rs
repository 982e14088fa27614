//! Free-form agent endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::routes::AppState;
use super::types::{ChatReply, ChatRequest};
use super::{processor_error, ApiError};

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let account_id = req.connected_account_id.filter(|id| !id.trim().is_empty());
    let run = state
        .processor
        .chat(&req.message, account_id)
        .await
        .map_err(processor_error)?;

    Ok(Json(ChatReply {
        response: run.response,
        log: run.log,
    }))
}
