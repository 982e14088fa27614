//! Payment endpoints: history and pass-through to the payments API.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::payments::{Payee, PaymentStatus};

use super::routes::AppState;
use super::types::{
    BalanceQuery, BalanceResponse, CheckoutRequest, CheckoutResponse, HistoryQuery,
    HistoryResponse, PayeesQuery,
};
use super::{payments_error, ApiError};

const DEFAULT_HISTORY_LIMIT: usize = 50;

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let store = state.processor.history();
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(HistoryResponse {
        payments: store.list(limit).await,
        total: store.len().await,
    })
}

pub async fn balance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let currency = query
        .currency
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_else(|| "USD".to_string());
    let balance = state
        .processor
        .payments()
        .spendable_balance(&currency)
        .await
        .map_err(payments_error)?;
    Ok(Json(BalanceResponse { currency, balance }))
}

pub async fn search_payees(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PayeesQuery>,
) -> Result<Json<Vec<Payee>>, ApiError> {
    if query.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".to_string()));
    }
    state
        .processor
        .payments()
        .search_payees(query.name.trim(), query.payee_type.as_deref())
        .await
        .map(Json)
        .map_err(payments_error)
}

pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentStatus>, ApiError> {
    state
        .processor
        .payments()
        .payment_status(&reference)
        .await
        .map(Json)
        .map_err(payments_error)
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    if let Some(currency) = req.currency.as_deref() {
        if !currency.eq_ignore_ascii_case("USD") {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported currency: {}", currency),
            ));
        }
    }
    let customer_id = req.customer_id.as_deref().unwrap_or("invoice-agent");
    let checkout_url = state
        .processor
        .payments()
        .checkout_url(
            req.amount,
            customer_id,
            req.customer_name.as_deref(),
            req.memo.as_deref(),
        )
        .await
        .map_err(payments_error)?;
    Ok(Json(CheckoutResponse { checkout_url }))
}
