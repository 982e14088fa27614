//! Single-payment tools: balance, payee search, send, status and checkout links.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{amount_arg, str_arg, SentPayment, Tool, ToolContext};

const MAX_PAYEES_LISTED: usize = 5;

/// Send a payment to a registered destination.
pub struct ProcessPayment;

#[async_trait]
impl Tool for ProcessPayment {
    fn name(&self) -> &str {
        "process_payment"
    }

    fn description(&self) -> &str {
        "Send a payment to a payment destination. Use search_payees first to find the destination ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to pay, in dollars (e.g. 1500.00)"
                },
                "destination_id": {
                    "type": "string",
                    "description": "Payment destination ID returned by search_payees"
                },
                "memo": {
                    "type": "string",
                    "description": "Optional memo, e.g. the invoice number"
                }
            },
            "required": ["amount", "destination_id"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let amount = amount_arg(&args, "amount")?;
        let destination_id = str_arg(&args, "destination_id")?;
        let memo = args["memo"].as_str().filter(|m| !m.trim().is_empty());

        let receipt = ctx.payments.send_payment(amount, destination_id, memo).await?;
        ctx.record_payment(SentPayment {
            reference: receipt.reference.clone(),
            amount,
            destination_id: destination_id.to_string(),
            memo: memo.map(str::to_string),
        })
        .await;

        Ok(format!(
            "Payment of ${:.2} sent successfully. Reference: {}",
            amount, receipt.reference
        ))
    }
}

/// Look up a previously sent payment.
pub struct CheckPaymentStatus;

#[async_trait]
impl Tool for CheckPaymentStatus {
    fn name(&self) -> &str {
        "check_payment_status"
    }

    fn description(&self) -> &str {
        "Check the status of a payment by its reference."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reference": {
                    "type": "string",
                    "description": "Payment reference returned by process_payment"
                }
            },
            "required": ["reference"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let reference = str_arg(&args, "reference")?;
        let status = ctx.payments.payment_status(reference).await?;

        let mut out = format!(
            "Payment {}: {}",
            status.reference,
            status.status.as_deref().unwrap_or("unknown")
        );
        if let Some(amount) = status.amount {
            out.push_str(&format!("\nAmount: ${:.2}", amount));
        }
        if let Some(memo) = &status.memo {
            out.push_str(&format!("\nMemo: {}", memo));
        }
        Ok(out)
    }
}

/// Find payment destinations by name.
pub struct SearchPayees;

#[async_trait]
impl Tool for SearchPayees {
    fn name(&self) -> &str {
        "search_payees"
    }

    fn description(&self) -> &str {
        "Search registered payment destinations by name. Returns up to 5 matches with their IDs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Name (or part of the name) of the payee"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let query = str_arg(&args, "query")?;
        let payees = ctx.payments.search_payees(query, None).await?;

        let lines: Vec<String> = payees
            .iter()
            .filter(|p| !p.id.is_empty() && !p.name.is_empty())
            .take(MAX_PAYEES_LISTED)
            .map(|p| format!("- {} (ID: {})", p.name, p.id))
            .collect();

        if lines.is_empty() {
            return Ok(format!("No payees found matching '{}'", query));
        }
        Ok(lines.join("\n"))
    }
}

/// Spendable balance of the paying account.
pub struct CheckBalance;

#[async_trait]
impl Tool for CheckBalance {
    fn name(&self) -> &str {
        "check_balance"
    }

    fn description(&self) -> &str {
        "Get the current spendable balance of the paying account."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "currency": {
                    "type": "string",
                    "description": "Currency code (default: USD)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let currency = args["currency"].as_str().unwrap_or("USD");
        let balance = ctx.payments.spendable_balance(currency).await?;
        Ok(format!("Current balance: ${:.2}", balance))
    }
}

/// Hosted checkout link so the account can be topped up.
pub struct GenerateCheckoutUrl;

#[async_trait]
impl Tool for GenerateCheckoutUrl {
    fn name(&self) -> &str {
        "generate_checkout_url"
    }

    fn description(&self) -> &str {
        "Generate a checkout URL to add funds when the balance is too low or the payee is not registered."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to collect, in dollars"
                },
                "currency": {
                    "type": "string",
                    "description": "Currency code (default: USD)"
                },
                "memo": {
                    "type": "string",
                    "description": "Optional memo shown on the checkout page"
                },
                "customer_name": {
                    "type": "string",
                    "description": "Optional name of the paying customer"
                }
            },
            "required": ["amount"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let amount = amount_arg(&args, "amount")?;
        let memo = args["memo"].as_str();
        let customer_name = args["customer_name"].as_str();
        let customer_id = ctx.account_id.as_deref().unwrap_or("invoice-agent");

        let url = ctx
            .payments
            .checkout_url(amount, customer_id, customer_name, memo)
            .await?;
        ctx.record_checkout_url(url.clone()).await;
        Ok(format!("Checkout URL for ${:.2}: {}", amount, url))
    }
}
