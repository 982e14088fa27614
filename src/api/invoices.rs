//! Invoice endpoints: scan, list, pay.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::history::PaymentRecord;
use crate::invoice::Invoice;
use crate::processor::{ProcessReport, ScanReport};

use super::routes::AppState;
use super::types::ScanRequest;
use super::{processor_error, ApiError};

pub async fn scan_inbox(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanReport>, ApiError> {
    if req.connected_account_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "connected_account_id is required".to_string(),
        ));
    }
    state
        .processor
        .scan_inbox(
            req.connected_account_id.trim(),
            req.query.as_deref(),
            req.max_results,
        )
        .await
        .map(Json)
        .map_err(processor_error)
}

pub async fn list_invoices(State(state): State<Arc<AppState>>) -> Json<Vec<Invoice>> {
    Json(state.processor.invoices().await)
}

pub async fn pay_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    state
        .processor
        .pay_invoice(&id)
        .await
        .map(Json)
        .map_err(processor_error)
}

pub async fn process_pending(State(state): State<Arc<AppState>>) -> Json<ProcessReport> {
    let report = state.processor.process_pending().await;
    tracing::info!(
        processed = report.processed,
        paid = report.paid,
        failed = report.failed,
        "Processed pending invoices"
    );
    Json(report)
}
