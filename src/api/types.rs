//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::config::PaymentMode;
use crate::history::PaymentRecord;

/// A single entry in an agent execution log.
#[derive(Debug, Clone, Serialize)]
pub struct TaskLogEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub entry_type: LogEntryType,

    pub content: String,
}

/// Types of log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    /// Model text emitted alongside tool calls
    Thinking,
    /// Tool is being called
    ToolCall,
    /// Tool returned a result
    ToolResult,
    /// Agent produced final response
    Response,
    /// A tool call failed
    Error,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether API calls need a bearer token.
    pub auth_required: bool,
    pub payment_mode: PaymentMode,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectGmailRequest {
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub connected_account_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub payments: Vec<PaymentRecord>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub currency: String,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct PayeesQuery {
    pub name: String,
    #[serde(default, rename = "type")]
    pub payee_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub connected_account_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub log: Vec<TaskLogEntry>,
}
