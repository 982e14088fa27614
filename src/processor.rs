//! Invoice pipeline: scan the mailbox, keep an invoice book, pay invoices.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::agent::{invoice_payment_task, Agent, AgentRun};
use crate::config::{Config, PaymentMode, ScanConfig};
use crate::connector::{ConnectorClient, ConnectorError, EmailMessage};
use crate::history::{HistoryStore, PaymentOutcome, PaymentRecord};
use crate::invoice::{
    extract_fields, invoice_id, pdf_text, EmailSummary, Invoice, InvoiceStatus,
};
use crate::payments::{PaymentsClient, PaymentsError};
use crate::tools::{pay_named_recipient, BatchItem, ItemOutcome, ToolContext};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Invoice not found: {0}")]
    NotFound(String),

    #[error("Invoice {id} is {status:?} and cannot be paid")]
    Conflict { id: String, status: InvoiceStatus },

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Payments(#[from] PaymentsError),

    #[error("Agent run failed: {0}")]
    Agent(anyhow::Error),
}

/// An attachment that could not be turned into an invoice.
#[derive(Debug, Clone, Serialize)]
pub struct ScanError {
    pub message_id: String,
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub emails_scanned: usize,
    pub attachments_found: usize,
    /// Invoices added or refreshed by this scan.
    pub invoices: Vec<Invoice>,
    /// Known invoices left untouched because they are past `pending`.
    pub skipped: usize,
    pub errors: Vec<ScanError>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub processed: usize,
    pub paid: usize,
    pub awaiting_funds: usize,
    pub failed: usize,
    pub total_paid: f64,
    pub records: Vec<PaymentRecord>,
}

/// Scanned invoices plus the ids of paid invoices dropped from the book.
///
/// At most `capacity` invoices are kept; the oldest paid ones are evicted
/// first and their ids stay in `settled` so a rescan never re-queues them.
#[derive(Debug, Default)]
struct InvoiceBook {
    entries: HashMap<String, Invoice>,
    settled: HashSet<String>,
    capacity: usize,
}

impl InvoiceBook {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Whether a scan may (re)write this invoice.
    fn accepts_scan(&self, id: &str) -> bool {
        !self.settled.contains(id)
            && self
                .entries
                .get(id)
                .map_or(true, |i| i.status == InvoiceStatus::Pending)
    }

    fn evict_settled(&mut self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .values()
                .filter(|i| i.status == InvoiceStatus::Paid)
                .min_by(|a, b| a.updated_at.cmp(&b.updated_at))
                .map(|i| i.id.clone());
            let Some(id) = oldest else { break };
            self.entries.remove(&id);
            tracing::debug!(invoice_id = %id, "Evicted paid invoice from the book");
            self.settled.insert(id);
        }
    }

    fn set_status(&mut self, id: &str, status: InvoiceStatus) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.status = status;
            entry.updated_at = chrono::Utc::now().to_rfc3339();
        }
        if status == InvoiceStatus::Paid {
            self.evict_settled();
        }
    }
}

/// Every field is shared, so clones are cheap and a payment task can
/// outlive the request that started it.
#[derive(Clone)]
pub struct InvoiceProcessor {
    connector: Arc<ConnectorClient>,
    payments: Arc<PaymentsClient>,
    agent: Arc<Agent>,
    history: Arc<HistoryStore>,
    book: Arc<RwLock<InvoiceBook>>,
    payment_mode: PaymentMode,
    scan: ScanConfig,
}

impl InvoiceProcessor {
    pub fn new(config: &Config) -> Self {
        Self::with_agent(config, Agent::new(config))
    }

    pub fn with_agent(config: &Config, agent: Agent) -> Self {
        Self {
            connector: Arc::new(ConnectorClient::new(&config.connector)),
            payments: Arc::new(PaymentsClient::new(&config.payments)),
            agent: Arc::new(agent),
            history: Arc::new(HistoryStore::new(config.history_capacity)),
            book: Arc::new(RwLock::new(InvoiceBook::with_capacity(config.history_capacity))),
            payment_mode: config.payment_mode,
            scan: config.scan.clone(),
        }
    }

    pub fn connector(&self) -> &ConnectorClient {
        &self.connector
    }

    pub fn payments(&self) -> &PaymentsClient {
        &self.payments
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn payment_mode(&self) -> PaymentMode {
        self.payment_mode
    }

    fn tool_context(&self, account_id: Option<String>) -> ToolContext {
        ToolContext::new(
            self.payments.clone(),
            self.connector.clone(),
            account_id,
            self.scan.clone(),
        )
    }

    /// Fetch invoice emails and add every readable PDF to the invoice book.
    pub async fn scan_inbox(
        &self,
        account_id: &str,
        query: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<ScanReport, ProcessorError> {
        let query = query.filter(|q| !q.trim().is_empty()).unwrap_or(self.scan.query.as_str());
        let max_results = max_results.unwrap_or(self.scan.max_results);
        tracing::info!(account_id, query, max_results, "Scanning inbox for invoices");

        let emails = self
            .connector
            .fetch_emails(account_id, query, max_results)
            .await?;

        let mut report = ScanReport {
            emails_scanned: emails.len(),
            ..Default::default()
        };

        for email in &emails {
            for attachment in email.attachments.iter().filter(|a| a.is_pdf()) {
                report.attachments_found += 1;
                let id = invoice_id(&email.message_id, &attachment.attachment_id);

                if !self.book.read().await.accepts_scan(&id) {
                    report.skipped += 1;
                    continue;
                }

                match self
                    .read_invoice(account_id, email, &attachment.attachment_id, &attachment.filename)
                    .await
                {
                    Ok(fields) => match self.upsert(id, email, &attachment.filename, fields).await {
                        Some(invoice) => report.invoices.push(invoice),
                        None => report.skipped += 1,
                    },
                    Err(error) => {
                        tracing::warn!(
                            message_id = %email.message_id,
                            filename = %attachment.filename,
                            error = %error,
                            "Skipping attachment"
                        );
                        report.errors.push(ScanError {
                            message_id: email.message_id.clone(),
                            filename: attachment.filename.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            found = report.attachments_found,
            added = report.invoices.len(),
            skipped = report.skipped,
            errors = report.errors.len(),
            "Inbox scan finished"
        );
        Ok(report)
    }

    async fn read_invoice(
        &self,
        account_id: &str,
        email: &EmailMessage,
        attachment_id: &str,
        filename: &str,
    ) -> anyhow::Result<crate::invoice::InvoiceFields> {
        let bytes = self
            .connector
            .download_attachment(account_id, &email.message_id, attachment_id, filename)
            .await?;
        let text = tokio::task::spawn_blocking(move || pdf_text(&bytes)).await??;
        extract_fields(&text.join("\n"))
            .ok_or_else(|| anyhow::anyhow!("No payable amount found in {}", filename))
    }

    /// Insert or refresh a pending invoice. Returns `None` when the invoice
    /// moved past `pending` while its attachment was being read.
    async fn upsert(
        &self,
        id: String,
        email: &EmailMessage,
        filename: &str,
        fields: crate::invoice::InvoiceFields,
    ) -> Option<Invoice> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut book = self.book.write().await;
        if !book.accepts_scan(&id) {
            return None;
        }
        let created_at = book
            .entries
            .get(&id)
            .map(|i| i.created_at.clone())
            .unwrap_or_else(|| now.clone());

        let invoice = Invoice {
            id: id.clone(),
            email: EmailSummary {
                message_id: email.message_id.clone(),
                subject: email.subject.clone(),
                sender: email.sender.clone(),
                timestamp: email.timestamp.clone(),
            },
            attachment_filename: filename.to_string(),
            fields,
            status: InvoiceStatus::Pending,
            created_at,
            updated_at: now,
        };
        book.entries.insert(id, invoice.clone());
        book.evict_settled();
        Some(invoice)
    }

    /// All known invoices, newest first.
    pub async fn invoices(&self) -> Vec<Invoice> {
        let mut list: Vec<Invoice> = self.book.read().await.entries.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub async fn invoice(&self, id: &str) -> Option<Invoice> {
        self.book.read().await.entries.get(id).cloned()
    }

    /// Pay one invoice and record the attempt in history.
    ///
    /// Upstream failures do not make this fail: they end up in the record and
    /// the invoice is marked `failed`. The payment runs on its own task, so
    /// dropping the returned future does not leave the invoice `processing`.
    pub async fn pay_invoice(&self, id: &str) -> Result<PaymentRecord, ProcessorError> {
        let invoice = {
            let mut book = self.book.write().await;
            let invoice = book
                .entries
                .get_mut(id)
                .ok_or_else(|| ProcessorError::NotFound(id.to_string()))?;
            if !invoice.status.is_payable() {
                return Err(ProcessorError::Conflict {
                    id: id.to_string(),
                    status: invoice.status,
                });
            }
            invoice.status = InvoiceStatus::Processing;
            invoice.updated_at = chrono::Utc::now().to_rfc3339();
            invoice.clone()
        };

        let worker = self.clone();
        match tokio::spawn(async move { worker.settle(invoice).await }).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::error!(invoice_id = %id, error = %e, "Payment task aborted");
                self.book.write().await.set_status(id, InvoiceStatus::Failed);
                Err(ProcessorError::Agent(anyhow::anyhow!("payment task aborted: {}", e)))
            }
        }
    }

    async fn settle(&self, invoice: Invoice) -> PaymentRecord {
        tracing::info!(
            invoice_id = %invoice.id,
            number = %invoice.fields.invoice_number,
            amount = invoice.fields.amount,
            mode = ?self.payment_mode,
            "Paying invoice"
        );

        let (outcome, agent_summary) = match self.payment_mode {
            PaymentMode::Agent => self.pay_with_agent(&invoice).await,
            PaymentMode::Direct => (self.pay_direct(&invoice).await, None),
        };

        let status = if outcome.success {
            InvoiceStatus::Paid
        } else if outcome.checkout_url.is_some() {
            InvoiceStatus::AwaitingFunds
        } else {
            InvoiceStatus::Failed
        };
        self.book.write().await.set_status(&invoice.id, status);

        let mut record = PaymentRecord::for_invoice(&invoice, outcome);
        record.agent_summary = agent_summary;
        self.history.record(record.clone()).await;

        tracing::info!(invoice_id = %invoice.id, status = ?status, "Invoice payment finished");
        record
    }

    /// Success is taken from the payments the tools actually sent.
    async fn pay_with_agent(&self, invoice: &Invoice) -> (PaymentOutcome, Option<String>) {
        let ctx = self.tool_context(None);
        let run = self.agent.run_task(&invoice_payment_task(invoice), &ctx).await;
        let effects = ctx.effects().await;

        let (summary, run_error) = match run {
            Ok(run) => (Some(run.response), None),
            Err(e) => {
                tracing::error!(invoice_id = %invoice.id, error = %e, "Agent run failed");
                (None, Some(e.to_string()))
            }
        };

        let mut outcome = PaymentOutcome {
            success: false,
            amount: invoice.fields.amount,
            recipient: invoice.fields.recipient.clone(),
            reference: None,
            checkout_url: None,
            error: None,
        };

        if let Some(sent) = effects.payments.first() {
            if effects.payments.len() > 1 {
                tracing::warn!(
                    invoice_id = %invoice.id,
                    count = effects.payments.len(),
                    "Agent sent more than one payment for an invoice"
                );
            }
            outcome.success = true;
            outcome.amount = sent.amount;
            outcome.reference = Some(sent.reference.clone());
        } else if let Some(url) = effects.checkout_urls.last() {
            outcome.checkout_url = Some(url.clone());
            outcome.error = run_error;
        } else {
            outcome.error =
                Some(run_error.unwrap_or_else(|| "Agent finished without sending a payment".to_string()));
        }

        (outcome, summary)
    }

    async fn pay_direct(&self, invoice: &Invoice) -> PaymentOutcome {
        let fields = &invoice.fields;
        let mut outcome = PaymentOutcome {
            success: false,
            amount: fields.amount,
            recipient: fields.recipient.clone(),
            reference: None,
            checkout_url: None,
            error: None,
        };

        if !fields.has_recipient() {
            outcome.error = Some("Invoice has no recipient".to_string());
            return outcome;
        }

        let balance = match self.payments.spendable_balance(&fields.currency).await {
            Ok(balance) => balance,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        if balance < fields.amount {
            outcome.error = Some(format!(
                "Insufficient funds: need ${:.2}, available ${:.2} (short ${:.2})",
                fields.amount,
                balance,
                fields.amount - balance
            ));
            return outcome;
        }

        let ctx = self.tool_context(None);
        let item = BatchItem {
            id: fields.invoice_number.clone(),
            amount: fields.amount,
            currency: fields.currency.clone(),
            recipient_name: fields.recipient.clone(),
            memo: Some(fields.invoice_number.clone()),
        };
        let result = pay_named_recipient(&ctx, &item).await;
        outcome.recipient = result.recipient;

        match result.outcome {
            ItemOutcome::Paid { reference } => {
                outcome.success = true;
                outcome.reference = Some(reference);
            }
            ItemOutcome::PayeeNotFound => {
                outcome.error = Some(format!("Payee '{}' not found", fields.recipient));
                match self
                    .payments
                    .checkout_url(
                        fields.amount,
                        "invoice-agent",
                        Some(&fields.recipient),
                        Some(&fields.invoice_number),
                    )
                    .await
                {
                    Ok(url) => outcome.checkout_url = Some(url),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not generate checkout URL");
                    }
                }
            }
            ItemOutcome::Failed { error } => outcome.error = Some(error),
        }
        outcome
    }

    /// Pay every pending invoice, oldest first.
    pub async fn process_pending(&self) -> ProcessReport {
        let mut pending: Vec<Invoice> = self
            .book
            .read()
            .await
            .entries
            .values()
            .filter(|i| i.status == InvoiceStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut report = ProcessReport::default();
        for invoice in pending {
            let record = match self.pay_invoice(&invoice.id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(invoice_id = %invoice.id, error = %e, "Skipping invoice");
                    continue;
                }
            };
            report.processed += 1;
            if record.payment.success {
                report.paid += 1;
                report.total_paid += record.payment.amount;
            } else if record.payment.checkout_url.is_some() {
                report.awaiting_funds += 1;
            } else {
                report.failed += 1;
            }
            report.records.push(record);
        }
        report
    }

    /// Free-form instruction to the payment agent.
    ///
    /// Payments the agent sends are recorded in history.
    pub async fn chat(
        &self,
        message: &str,
        account_id: Option<String>,
    ) -> Result<AgentRun, ProcessorError> {
        let ctx = self.tool_context(account_id);
        let run = self.agent.run_task(message, &ctx).await;

        for sent in ctx.effects().await.payments {
            let recipient = sent.destination_id.clone();
            self.history
                .record(PaymentRecord {
                    id: uuid::Uuid::new_v4(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    invoice_id: None,
                    email: EmailSummary::default(),
                    invoice: crate::history::InvoiceSnapshot {
                        invoice_number: sent.memo.clone().unwrap_or_default(),
                        amount: sent.amount,
                        recipient: recipient.clone(),
                        due_date: None,
                        memo: sent.memo.clone().unwrap_or_default(),
                    },
                    payment: PaymentOutcome {
                        success: true,
                        amount: sent.amount,
                        recipient,
                        reference: Some(sent.reference),
                        checkout_url: None,
                        error: None,
                    },
                    agent_summary: run.as_ref().ok().map(|r| r.response.clone()),
                })
                .await;
        }

        run.map_err(ProcessorError::Agent)
    }
}
