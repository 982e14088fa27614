//! Payments API client.
//!
//! Thin pass-through to the payments REST API: spendable balance, payee
//! search, send payment, payment status and hosted checkout links.

mod types;

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::PaymentsConfig;

pub use types::{Payee, PaymentReceipt, PaymentStatus};

/// Destination type searched when the caller does not specify one.
pub const DEFAULT_PAYEE_TYPE: &str = "US_ACH";

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("payments request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payments API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected payments response: {0}")]
    Decode(String),

    #[error("invalid amount {0}: must be a positive number")]
    InvalidAmount(f64),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}

pub struct PaymentsClient {
    http: reqwest::Client,
    base_url: String,
    api_secret: String,
}

impl PaymentsClient {
    pub fn new(config: &PaymentsConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_secret: config.api_secret.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-payman-api-secret", &self.api_secret)
            .header("Accept", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, PaymentsError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Payments API error");
            return Err(PaymentsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| PaymentsError::Decode(format!("{}: {}", e, text)))
    }

    /// Current spendable balance in `currency`.
    pub async fn spendable_balance(&self, currency: &str) -> Result<f64, PaymentsError> {
        let value: Value = self
            .send(self.request(
                Method::GET,
                &format!("/balances/currencies/{}", path_segment(currency)?),
            ))
            .await?;
        balance_from_value(&value)
            .ok_or_else(|| PaymentsError::Decode(format!("no balance in {}", value)))
    }

    /// Search registered payment destinations by name.
    pub async fn search_payees(
        &self,
        name: &str,
        payee_type: Option<&str>,
    ) -> Result<Vec<Payee>, PaymentsError> {
        let req = self.request(Method::GET, "/payments/search-payees").query(&[
            ("name", name),
            ("type", payee_type.unwrap_or(DEFAULT_PAYEE_TYPE)),
        ]);
        let value: Value = self.send(req).await?;
        // Some deployments wrap the list in `{"results": [...]}`.
        let list = match value {
            Value::Array(_) => value,
            Value::Object(mut map) => map
                .remove("results")
                .or_else(|| map.remove("payees"))
                .unwrap_or(Value::Array(Vec::new())),
            _ => Value::Array(Vec::new()),
        };
        serde_json::from_value(list).map_err(|e| PaymentsError::Decode(e.to_string()))
    }

    /// Send `amount` to a registered destination.
    pub async fn send_payment(
        &self,
        amount: f64,
        destination_id: &str,
        memo: Option<&str>,
    ) -> Result<PaymentReceipt, PaymentsError> {
        check_amount(amount)?;
        tracing::info!(amount, destination_id, "Sending payment");
        let req = self.request(Method::POST, "/payments/send-payment").json(&json!({
            "amountDecimal": amount,
            "paymentDestinationId": destination_id,
            "memo": memo,
        }));
        let value: Value = self.send(req).await?;
        PaymentReceipt::from_value(&value)
            .ok_or_else(|| PaymentsError::Decode(format!("no payment reference in {}", value)))
    }

    /// Look up a payment by reference.
    pub async fn payment_status(&self, reference: &str) -> Result<PaymentStatus, PaymentsError> {
        let value: Value = self
            .send(self.request(Method::GET, &format!("/payments/{}", path_segment(reference)?)))
            .await?;
        PaymentStatus::from_value(&value)
            .ok_or_else(|| PaymentsError::Decode(format!("no payment reference in {}", value)))
    }

    /// Generate a hosted checkout URL for a customer to add funds.
    pub async fn checkout_url(
        &self,
        amount: f64,
        customer_id: &str,
        customer_name: Option<&str>,
        memo: Option<&str>,
    ) -> Result<String, PaymentsError> {
        check_amount(amount)?;
        let req = self
            .request(Method::POST, "/payments/customer-deposit-link")
            .json(&json!({
                "amountDecimal": amount,
                "customerId": customer_id,
                "customerName": customer_name,
                "memo": memo,
                "feeMode": "INCLUDED_IN_AMOUNT",
            }));
        let value: Value = self.send(req).await?;
        value
            .get("checkoutUrl")
            .or_else(|| value.get("checkout_url"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| PaymentsError::Decode(format!("no checkout URL in {}", value)))
    }
}

/// Percent-encode one URL path segment. Empty and dot segments are refused.
fn path_segment(value: &str) -> Result<String, PaymentsError> {
    match value {
        "" | "." | ".." => Err(PaymentsError::InvalidIdentifier(value.to_string())),
        _ => Ok(urlencoding::encode(value).into_owned()),
    }
}

fn check_amount(amount: f64) -> Result<(), PaymentsError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(PaymentsError::InvalidAmount(amount))
    }
}

fn balance_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => ["spendableBalance", "balance", "amount"]
            .iter()
            .find_map(|key| map.get(*key).and_then(balance_from_value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> PaymentsClient {
        PaymentsClient::new(&PaymentsConfig {
            api_secret: "secret".to_string(),
            base_url: server.url(""),
        })
    }

    #[test]
    fn balance_accepts_number_string_and_object() {
        assert_eq!(balance_from_value(&json!(12.5)), Some(12.5));
        assert_eq!(balance_from_value(&json!("40.00")), Some(40.0));
        assert_eq!(balance_from_value(&json!({"spendableBalance": 7})), Some(7.0));
        assert_eq!(balance_from_value(&json!({"other": 1})), None);
    }

    #[tokio::test]
    async fn spendable_balance_sends_secret_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/balances/currencies/USD")
                    .header("x-payman-api-secret", "secret");
                then.status(200).body("1500.25");
            })
            .await;

        let balance = client(&server).spendable_balance("USD").await.expect("balance");
        mock.assert_async().await;
        assert_eq!(balance, 1500.25);
    }

    #[tokio::test]
    async fn search_payees_uses_default_type_and_unwraps_results() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/payments/search-payees")
                    .query_param("name", "Slingshot AI")
                    .query_param("type", "US_ACH");
                then.status(200).json_body(json!({
                    "results": [{"id": "pd-1", "name": "Slingshot AI", "type": "US_ACH"}]
                }));
            })
            .await;

        let payees = client(&server)
            .search_payees("Slingshot AI", None)
            .await
            .expect("payees");
        assert_eq!(payees.len(), 1);
        assert_eq!(payees[0].id, "pd-1");
    }

    #[tokio::test]
    async fn send_payment_rejects_non_positive_amount_locally() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/payments/send-payment");
                then.status(200).json_body(json!({"reference": "x"}));
            })
            .await;

        let err = client(&server)
            .send_payment(0.0, "pd-1", None)
            .await
            .expect_err("zero amount");
        assert!(matches!(err, PaymentsError::InvalidAmount(_)));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn send_payment_returns_receipt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/payments/send-payment")
                    .json_body_partial(r#"{"paymentDestinationId": "pd-1", "memo": "INV-7"}"#);
                then.status(200)
                    .json_body(json!({"reference": "ref-123", "status": "PENDING"}));
            })
            .await;

        let receipt = client(&server)
            .send_payment(250.0, "pd-1", Some("INV-7"))
            .await
            .expect("receipt");
        assert_eq!(receipt.reference, "ref-123");
        assert_eq!(receipt.status.as_deref(), Some("PENDING"));
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/payments/ref-404");
                then.status(404).body("not found");
            })
            .await;

        let err = client(&server)
            .payment_status("ref-404")
            .await
            .expect_err("missing payment");
        match err {
            PaymentsError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn checkout_url_reads_either_key_spelling() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/payments/customer-deposit-link")
                    .json_body_partial(r#"{"feeMode": "INCLUDED_IN_AMOUNT"}"#);
                then.status(200)
                    .json_body(json!({"checkout_url": "https://pay.example/c/1"}));
            })
            .await;

        let url = client(&server)
            .checkout_url(80.0, "default", Some("Acme"), None)
            .await
            .expect("url");
        assert_eq!(url, "https://pay.example/c/1");
    }

    #[tokio::test]
    async fn path_identifiers_cannot_escape_their_segment() {
        let server = MockServer::start_async().await;
        let balance = server
            .mock_async(|when, then| {
                when.method(GET).path("/balances/currencies/USD");
                then.status(200).json_body(json!("acct"));
            })
            .await;
        let client = client(&server);

        let traversal = client.payment_status("../balances/currencies/USD").await;
        assert!(traversal.is_err());
        balance.assert_hits_async(0).await;

        let dots = client.payment_status("..").await.expect_err("dot segment");
        assert!(matches!(dots, PaymentsError::InvalidIdentifier(_)));
        let empty = client.spendable_balance("").await.expect_err("empty segment");
        assert!(matches!(empty, PaymentsError::InvalidIdentifier(_)));
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(path_segment("ref-1").unwrap(), "ref-1");
        assert_eq!(path_segment("a/b?c").unwrap(), "a%2Fb%3Fc");
    }
}
