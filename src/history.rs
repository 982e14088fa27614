//! In-memory payment history (non-persistent).
//!
//! A bounded ring buffer: once `capacity` records are held, recording a new
//! one evicts the oldest.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::invoice::{EmailSummary, Invoice};

/// Invoice fields as shown in the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub invoice_number: String,
    pub amount: f64,
    pub recipient: String,
    pub due_date: Option<String>,
    pub memo: String,
}

/// What happened to the money.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub amount: f64,
    pub recipient: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub timestamp: String,
    pub invoice_id: Option<String>,
    pub email: EmailSummary,
    pub invoice: InvoiceSnapshot,
    pub payment: PaymentOutcome,
    /// Final answer of the agent when the payment was agent-driven.
    #[serde(default)]
    pub agent_summary: Option<String>,
}

impl PaymentRecord {
    /// Start a record for `invoice` with the given outcome.
    pub fn for_invoice(invoice: &Invoice, payment: PaymentOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            invoice_id: Some(invoice.id.clone()),
            email: invoice.email.clone(),
            invoice: InvoiceSnapshot {
                invoice_number: invoice.fields.invoice_number.clone(),
                amount: invoice.fields.amount,
                recipient: invoice.fields.recipient.clone(),
                due_date: invoice.fields.due_date.clone(),
                memo: invoice.fields.memo.clone(),
            },
            payment,
            agent_summary: None,
        }
    }
}

pub struct HistoryStore {
    records: RwLock<VecDeque<PaymentRecord>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn record(&self, record: PaymentRecord) {
        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            if let Some(evicted) = records.pop_front() {
                tracing::debug!(record_id = %evicted.id, "Evicting oldest payment record");
            }
        }
        records.push_back(record);
    }

    /// Newest first, at most `limit` records.
    pub async fn list(&self, limit: usize) -> Vec<PaymentRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Option<PaymentRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            invoice_id: None,
            email: EmailSummary::default(),
            invoice: InvoiceSnapshot {
                invoice_number: format!("INV-{}", n),
                amount: n as f64,
                recipient: "Acme".to_string(),
                due_date: None,
                memo: String::new(),
            },
            payment: PaymentOutcome {
                success: true,
                amount: n as f64,
                recipient: "Acme".to_string(),
                reference: Some(format!("ref-{}", n)),
                checkout_url: None,
                error: None,
            },
            agent_summary: None,
        }
    }

    #[tokio::test]
    async fn evicts_oldest_when_full() {
        let store = HistoryStore::new(3);
        for n in 1..=5 {
            store.record(record(n)).await;
        }

        assert_eq!(store.len().await, 3);
        let numbers: Vec<String> = store
            .list(10)
            .await
            .into_iter()
            .map(|r| r.invoice.invoice_number)
            .collect();
        assert_eq!(numbers, vec!["INV-5", "INV-4", "INV-3"]);
    }

    #[tokio::test]
    async fn default_capacity_is_one_hundred() {
        let store = HistoryStore::default();
        for n in 0..150 {
            store.record(record(n)).await;
        }
        assert_eq!(store.capacity(), 100);
        assert_eq!(store.len().await, 100);
        let newest = store.list(1).await;
        assert_eq!(newest[0].invoice.invoice_number, "INV-149");
    }

    #[tokio::test]
    async fn get_finds_by_id_and_clear_empties() {
        let store = HistoryStore::new(5);
        let rec = record(1);
        let id = rec.id;
        store.record(rec).await;

        assert_eq!(store.get(id).await.map(|r| r.id), Some(id));
        assert!(store.get(Uuid::new_v4()).await.is_none());

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(HistoryStore::new(0).capacity(), 1);
    }
}
