//! Tools the agent can call.
//!
//! Each tool is defined once and reaches the outside world only through the
//! clients in its [`ToolContext`]. The context also records the payment side
//! effects of a run, so callers can tell what actually happened without
//! parsing model prose.

mod batch;
mod email;
mod payments;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::ScanConfig;
use crate::connector::ConnectorClient;
use crate::llm::{FunctionSchema, ToolSchema};
use crate::payments::PaymentsClient;

pub use batch::{
    format_payment_summary, pay_named_recipient, BatchItem, BatchItemResult, ItemOutcome,
};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String>;
}

/// A payment that left the account during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SentPayment {
    pub reference: String,
    pub amount: f64,
    pub destination_id: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunEffects {
    pub payments: Vec<SentPayment>,
    pub checkout_urls: Vec<String>,
}

/// Per-run state handed to every tool call.
pub struct ToolContext {
    pub payments: Arc<PaymentsClient>,
    pub connector: Arc<ConnectorClient>,
    /// Connected mailbox, when the run has one.
    pub account_id: Option<String>,
    pub scan: ScanConfig,
    effects: Mutex<RunEffects>,
}

impl ToolContext {
    pub fn new(
        payments: Arc<PaymentsClient>,
        connector: Arc<ConnectorClient>,
        account_id: Option<String>,
        scan: ScanConfig,
    ) -> Self {
        Self {
            payments,
            connector,
            account_id,
            scan,
            effects: Mutex::new(RunEffects::default()),
        }
    }

    pub async fn record_payment(&self, payment: SentPayment) {
        self.effects.lock().await.payments.push(payment);
    }

    pub async fn record_checkout_url(&self, url: String) {
        self.effects.lock().await.checkout_urls.push(url);
    }

    pub async fn effects(&self) -> RunEffects {
        self.effects.lock().await.clone()
    }
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with every payment and mailbox tool.
    pub fn new() -> Self {
        Self::with_tools(vec![
            Box::new(payments::ProcessPayment),
            Box::new(payments::CheckPaymentStatus),
            Box::new(payments::SearchPayees),
            Box::new(payments::CheckBalance),
            Box::new(payments::GenerateCheckoutUrl),
            Box::new(batch::ProcessBatchPayments),
            Box::new(email::FetchInvoiceEmails),
        ])
    }

    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                schema_type: "function",
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a positive amount that the model may send as a number or a string.
pub(crate) fn amount_arg(args: &Value, key: &str) -> anyhow::Result<f64> {
    let amount = match &args[key] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow::anyhow!("Missing or invalid '{}' argument", key))?;

    if !(amount.is_finite() && amount > 0.0) {
        anyhow::bail!("'{}' must be greater than 0, got {}", key, amount);
    }
    Ok(amount)
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{ConnectorConfig, PaymentsConfig};

    pub fn context(payments_url: String, connector_url: String) -> ToolContext {
        ToolContext::new(
            Arc::new(PaymentsClient::new(&PaymentsConfig {
                api_secret: "secret".to_string(),
                base_url: payments_url,
            })),
            Arc::new(ConnectorClient::new(&ConnectorConfig {
                api_key: "ck".to_string(),
                base_url: connector_url,
                gmail_integration_id: None,
            })),
            Some("ca-1".to_string()),
            ScanConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_arg_accepts_numbers_and_money_strings() {
        assert_eq!(amount_arg(&json!({"amount": 12.5}), "amount").unwrap(), 12.5);
        assert_eq!(amount_arg(&json!({"amount": "$1,200.00"}), "amount").unwrap(), 1200.0);
        assert!(amount_arg(&json!({"amount": -3}), "amount").is_err());
        assert!(amount_arg(&json!({}), "amount").is_err());
    }

    #[test]
    fn registry_exposes_the_five_payment_tools() {
        let registry = ToolRegistry::new();
        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "process_payment",
            "check_payment_status",
            "search_payees",
            "check_balance",
            "generate_checkout_url",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        let schemas = registry.get_tool_schemas();
        assert_eq!(schemas.len(), names.len());
        assert!(schemas.iter().all(|s| s.function.parameters["type"] == "object"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let ctx = test_support::context("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into());
        let err = ToolRegistry::new()
            .execute("wire_everything", json!({}), &ctx)
            .await
            .expect_err("unknown tool");
        assert!(err.to_string().contains("Unknown tool"));
    }
}
