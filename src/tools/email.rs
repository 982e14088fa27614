//! Mailbox tool: list recent emails carrying PDF invoices.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

pub struct FetchInvoiceEmails;

#[async_trait]
impl Tool for FetchInvoiceEmails {
    fn name(&self) -> &str {
        "fetch_invoice_emails"
    }

    fn description(&self) -> &str {
        "List recent emails in the connected Gmail account that have PDF invoice attachments."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Gmail search query (default: invoices with attachments from the last 7 days)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of emails to search (default: 10)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let account_id = ctx
            .account_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No Gmail account is connected"))?;
        let query = args["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(ctx.scan.query.as_str());
        let max_results = args["max_results"]
            .as_u64()
            .map(|n| n.clamp(1, 50) as u32)
            .unwrap_or(ctx.scan.max_results);

        let emails = ctx
            .connector
            .fetch_emails(account_id, query, max_results)
            .await?;

        let mut out = Vec::new();
        for email in emails.iter().filter(|e| e.attachments.iter().any(|a| a.is_pdf())) {
            let pdfs: Vec<&str> = email
                .attachments
                .iter()
                .filter(|a| a.is_pdf())
                .map(|a| a.filename.as_str())
                .collect();
            out.push(format!(
                "- {} | from: {} | {} | attachments: {}",
                email.subject,
                email.sender,
                email.timestamp.as_deref().unwrap_or("unknown date"),
                pdfs.join(", ")
            ));
        }

        if out.is_empty() {
            return Ok(format!("No invoice emails found for query '{}'", query));
        }
        Ok(format!("Found {} invoice email(s):\n{}", out.len(), out.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn lists_only_emails_with_pdfs() {
        let server = MockServer::start_async().await;
        let fetch = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/actions/GMAIL_FETCH_EMAILS/execute")
                    .json_body_partial(r#"{"connectedAccountId": "ca-1"}"#);
                then.status(200).json_body(json!({
                    "successful": true,
                    "data": {"messages": [
                        {
                            "messageId": "m-1",
                            "subject": "Invoice INV-1",
                            "sender": "billing@acme.test",
                            "messageTimestamp": "2024-09-21T10:00:00Z",
                            "attachmentList": [
                                {"filename": "inv.pdf", "attachmentId": "a-1", "mimeType": "application/pdf"}
                            ]
                        },
                        {
                            "messageId": "m-2",
                            "subject": "Team photo",
                            "sender": "friend@example.test",
                            "attachmentList": [
                                {"filename": "photo.jpg", "attachmentId": "a-2", "mimeType": "image/jpeg"}
                            ]
                        }
                    ]}
                }));
            })
            .await;

        let ctx = context(server.url(""), server.url(""));
        let out = FetchInvoiceEmails.execute(json!({}), &ctx).await.unwrap();

        fetch.assert_async().await;
        assert!(out.starts_with("Found 1 invoice email(s):"));
        assert!(out.contains("Invoice INV-1 | from: billing@acme.test | 2024-09-21 10:00:00 | attachments: inv.pdf"));
        assert!(!out.contains("Team photo"));
    }

    #[tokio::test]
    async fn requires_connected_account() {
        let mut ctx = context("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into());
        ctx.account_id = None;
        let err = FetchInvoiceEmails
            .execute(json!({}), &ctx)
            .await
            .expect_err("no account");
        assert!(err.to_string().contains("No Gmail account"));
    }
}
