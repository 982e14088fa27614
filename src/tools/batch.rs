//! Batch payments by recipient name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{SentPayment, Tool, ToolContext};

/// One payment in a batch, addressed by recipient name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(rename = "recipientName", alias = "recipient_name")]
    pub recipient_name: String,
    #[serde(default)]
    pub memo: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Paid { reference: String },
    PayeeNotFound,
    Failed { error: String },
}

impl ItemOutcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Paid { .. } => None,
            Self::PayeeNotFound => Some("Payee not found"),
            Self::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub payment_id: String,
    /// Payee name as registered, or the requested name when no payee matched.
    pub recipient: String,
    pub amount: f64,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl BatchItemResult {
    pub fn is_paid(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Paid { .. })
    }
}

/// Search the payee for `item` and pay the first match.
///
/// Never fails as a whole: every problem ends up in the item outcome.
pub async fn pay_named_recipient(ctx: &ToolContext, item: &BatchItem) -> BatchItemResult {
    let result = |recipient: &str, outcome| BatchItemResult {
        payment_id: item.id.clone(),
        recipient: recipient.to_string(),
        amount: item.amount,
        outcome,
    };

    let payees = match ctx.payments.search_payees(&item.recipient_name, None).await {
        Ok(payees) => payees,
        Err(e) => {
            return result(
                &item.recipient_name,
                ItemOutcome::Failed {
                    error: e.to_string(),
                },
            )
        }
    };

    let Some(payee) = payees.into_iter().find(|p| !p.id.is_empty()) else {
        tracing::info!(recipient = %item.recipient_name, "No payee registered");
        return result(&item.recipient_name, ItemOutcome::PayeeNotFound);
    };

    let payee_name = if payee.name.is_empty() {
        item.recipient_name.clone()
    } else {
        payee.name.clone()
    };
    let memo = item
        .memo
        .clone()
        .unwrap_or_else(|| format!("Payment {} to {}", item.id, payee_name));

    match ctx
        .payments
        .send_payment(item.amount, &payee.id, Some(&memo))
        .await
    {
        Ok(receipt) => {
            ctx.record_payment(SentPayment {
                reference: receipt.reference.clone(),
                amount: item.amount,
                destination_id: payee.id,
                memo: Some(memo),
            })
            .await;
            result(
                &payee_name,
                ItemOutcome::Paid {
                    reference: receipt.reference,
                },
            )
        }
        Err(e) => result(
            &payee_name,
            ItemOutcome::Failed {
                error: e.to_string(),
            },
        ),
    }
}

/// Human-readable report of a batch run.
pub fn format_payment_summary(results: &[BatchItemResult], final_balance: Option<f64>) -> String {
    let (paid, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.is_paid());
    let mut lines = Vec::new();

    if !paid.is_empty() {
        lines.push("Successful Payments:".to_string());
        for r in &paid {
            if let ItemOutcome::Paid { reference } = &r.outcome {
                lines.push(format!(
                    "- Payment {}: ${:.2} to {} (Ref: {})",
                    r.payment_id, r.amount, r.recipient, reference
                ));
            }
        }
    }

    if !failed.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Failed Payments:".to_string());
        for r in &failed {
            if let Some(reason) = r.outcome.error() {
                lines.push(format!(
                    "- Payment {}: ${:.2} to {} ({})",
                    r.payment_id, r.amount, r.recipient, reason
                ));
            }
        }
    }

    let processed: f64 = paid.iter().map(|r| r.amount).sum();
    lines.push(String::new());
    lines.push("Summary:".to_string());
    lines.push(format!("- Total payments: {}", results.len()));
    lines.push(format!("- Successful: {}", paid.len()));
    lines.push(format!("- Failed: {}", failed.len()));
    lines.push(format!("- Total amount processed: ${:.2}", processed));
    if let Some(balance) = final_balance {
        lines.push(format!("- Remaining balance: ${:.2}", balance));
    }
    lines.join("\n")
}

pub struct ProcessBatchPayments;

#[async_trait]
impl Tool for ProcessBatchPayments {
    fn name(&self) -> &str {
        "process_batch_payments"
    }

    fn description(&self) -> &str {
        "Pay several invoices at once by recipient name. Refuses the whole batch if the balance does not cover the total."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "payments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "description": "Invoice number or other identifier"},
                            "amount": {"type": "number"},
                            "currency": {"type": "string", "description": "Currency code (default: USD)"},
                            "recipientName": {"type": "string", "description": "Name of the payee"},
                            "memo": {"type": "string"}
                        },
                        "required": ["id", "amount", "recipientName"]
                    }
                }
            },
            "required": ["payments"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let items: Vec<BatchItem> = serde_json::from_value(args["payments"].clone())
            .map_err(|e| anyhow::anyhow!("Invalid 'payments' argument: {}", e))?;
        if items.is_empty() {
            anyhow::bail!("'payments' must contain at least one payment");
        }
        if let Some(bad) = items.iter().find(|i| !(i.amount.is_finite() && i.amount > 0.0)) {
            anyhow::bail!("Payment {} has invalid amount {}", bad.id, bad.amount);
        }

        let total: f64 = items.iter().map(|i| i.amount).sum();
        let balance = ctx.payments.spendable_balance("USD").await?;
        if balance < total {
            return Ok(format!(
                "Error: Insufficient funds. Required: ${:.2}, Available: ${:.2}",
                total, balance
            ));
        }

        tracing::info!(count = items.len(), total, "Processing payment batch");
        let mut results = Vec::with_capacity(items.len());
        for item in &items {
            results.push(pay_named_recipient(ctx, item).await);
        }

        let final_balance = match ctx.payments.spendable_balance("USD").await {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read balance after batch");
                None
            }
        };
        Ok(format_payment_summary(&results, final_balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;
    use httpmock::prelude::*;

    fn item(id: &str, amount: f64, name: &str) -> BatchItem {
        BatchItem {
            id: id.to_string(),
            amount,
            currency: "USD".to_string(),
            recipient_name: name.to_string(),
            memo: None,
        }
    }

    #[test]
    fn summary_lists_both_sides_and_totals() {
        let results = vec![
            BatchItemResult {
                payment_id: "INV-1".into(),
                recipient: "Acme".into(),
                amount: 100.0,
                outcome: ItemOutcome::Paid {
                    reference: "ref-1".into(),
                },
            },
            BatchItemResult {
                payment_id: "INV-2".into(),
                recipient: "Ghost".into(),
                amount: 50.0,
                outcome: ItemOutcome::PayeeNotFound,
            },
        ];

        let summary = format_payment_summary(&results, Some(900.0));
        assert!(summary.contains("- Payment INV-1: $100.00 to Acme (Ref: ref-1)"));
        assert!(summary.contains("- Payment INV-2: $50.00 to Ghost (Payee not found)"));
        assert!(summary.contains("- Total payments: 2"));
        assert!(summary.contains("- Total amount processed: $100.00"));
        assert!(summary.ends_with("- Remaining balance: $900.00"));
    }

    #[test]
    fn batch_item_accepts_camel_case_recipient() {
        let item: BatchItem =
            serde_json::from_value(json!({"id": "1", "amount": 5.0, "recipientName": "Acme"}))
                .unwrap();
        assert_eq!(item.recipient_name, "Acme");
        assert_eq!(item.currency, "USD");
    }

    #[tokio::test]
    async fn refuses_batch_when_balance_is_short() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/balances/currencies/USD");
                then.status(200).json_body(json!({"spendableBalance": 120.0}));
            })
            .await;
        let send = server
            .mock_async(|when, then| {
                when.method(POST).path("/payments/send-payment");
                then.status(200).json_body(json!({"reference": "r"}));
            })
            .await;

        let ctx = context(server.url(""), server.url(""));
        let out = ProcessBatchPayments
            .execute(
                json!({"payments": [
                    {"id": "a", "amount": 100.0, "recipientName": "Acme"},
                    {"id": "b", "amount": 50.0, "recipientName": "Beta"}
                ]}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            "Error: Insufficient funds. Required: $150.00, Available: $120.00"
        );
        send.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn pays_first_match_and_reports_missing_payee() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/payments/search-payees").query_param("name", "Acme");
                then.status(200).json_body(json!([
                    {"id": "pd-acme", "name": "Acme Corp"},
                    {"id": "pd-other", "name": "Acme Other"}
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/payments/search-payees").query_param("name", "Ghost");
                then.status(200).json_body(json!([]));
            })
            .await;
        let send = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/payments/send-payment")
                    .json_body_partial(r#"{"paymentDestinationId": "pd-acme"}"#);
                then.status(200).json_body(json!({"reference": "ref-acme"}));
            })
            .await;

        let ctx = context(server.url(""), server.url(""));
        let paid = pay_named_recipient(&ctx, &item("INV-1", 10.0, "Acme")).await;
        let missing = pay_named_recipient(&ctx, &item("INV-2", 20.0, "Ghost")).await;

        send.assert_hits_async(1).await;
        assert_eq!(paid.recipient, "Acme Corp");
        assert_eq!(
            paid.outcome,
            ItemOutcome::Paid {
                reference: "ref-acme".into()
            }
        );
        assert_eq!(missing.outcome, ItemOutcome::PayeeNotFound);
        let effects = ctx.effects().await;
        assert_eq!(effects.payments.len(), 1);
        assert_eq!(effects.payments[0].memo.as_deref(), Some("Payment INV-1 to Acme Corp"));
    }
}
