//! Gmail connection endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::connector::{ConnectedAccount, ConnectionRequest};

use super::routes::AppState;
use super::types::ConnectGmailRequest;
use super::{connector_error, ApiError};

pub async fn connect_gmail(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ConnectGmailRequest>>,
) -> Result<Json<ConnectionRequest>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    if let Some(uri) = req.redirect_uri.as_deref() {
        let parsed = url::Url::parse(uri)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid redirect_uri: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err((
                StatusCode::BAD_REQUEST,
                "redirect_uri must be an http(s) URL".to_string(),
            ));
        }
    }

    let request = state
        .processor
        .connector()
        .initiate_connection(req.redirect_uri.as_deref(), req.entity_id.as_deref())
        .await
        .map_err(connector_error)?;

    tracing::info!(account_id = %request.connected_account_id, "Gmail connection initiated");
    Ok(Json(request))
}

pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectedAccount>, ApiError> {
    state
        .processor
        .connector()
        .connection_status(&id)
        .await
        .map(Json)
        .map_err(connector_error)
}
