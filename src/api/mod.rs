//! HTTP API for the dashboard.
//!
//! ## Endpoints
//!
//! - `GET /` - Dashboard page
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange the dashboard password for a token
//! - `POST /api/connections/gmail` - Start linking a Gmail mailbox
//! - `GET /api/connections/:id` - Connected account status
//! - `POST /api/invoices/scan` - Scan the mailbox for PDF invoices
//! - `GET /api/invoices` - Known invoices
//! - `POST /api/invoices/process` - Pay all pending invoices
//! - `POST /api/invoices/:id/pay` - Pay one invoice
//! - `GET /api/payments/history` - Recent payments
//! - `GET /api/payments/balance` - Spendable balance
//! - `GET /api/payments/payees` - Search payees
//! - `GET /api/payments/:reference` - Payment status
//! - `POST /api/payments/checkout` - Hosted checkout link
//! - `POST /api/agent/chat` - Free-form instruction to the agent

mod agent;
mod auth;
mod connections;
mod dashboard;
mod invoices;
mod payments;
mod routes;
pub mod types;

use axum::http::StatusCode;

use crate::connector::ConnectorError;
use crate::payments::PaymentsError;
use crate::processor::ProcessorError;

pub use routes::{router, serve, AppState};

type ApiError = (StatusCode, String);

fn connector_error(e: ConnectorError) -> ApiError {
    match e {
        ConnectorError::MissingIntegration => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        ConnectorError::InvalidIdentifier(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        ConnectorError::Status { status: 404, .. } => (StatusCode::NOT_FOUND, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

fn payments_error(e: PaymentsError) -> ApiError {
    match e {
        PaymentsError::InvalidAmount(_) | PaymentsError::InvalidIdentifier(_) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        PaymentsError::Status { status: 404, .. } => (StatusCode::NOT_FOUND, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

fn processor_error(e: ProcessorError) -> ApiError {
    match e {
        ProcessorError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        ProcessorError::Conflict { .. } => (StatusCode::CONFLICT, e.to_string()),
        ProcessorError::Connector(e) => connector_error(e),
        ProcessorError::Payments(e) => payments_error(e),
        ProcessorError::Agent(_) => {
            tracing::error!(error = %e, "Agent run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
