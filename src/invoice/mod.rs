//! Invoices: PDF text, payable fields, and the scanned-invoice record.

mod extract;
mod pdf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use extract::{extract_fields, extract_fields_at, InvoiceFields, DEFAULT_MEMO, UNKNOWN_RECIPIENT};
pub use pdf::pdf_text;

#[cfg(test)]
pub(crate) use pdf::sample_pdf;

/// Lifecycle of a scanned invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Scanned, not yet paid
    Pending,
    /// A payment run is in flight
    Processing,
    Paid,
    Failed,
    /// No payment went out but a checkout URL was generated
    AwaitingFunds,
}

impl InvoiceStatus {
    /// Whether a payment may be started from this state.
    pub fn is_payable(self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::AwaitingFunds)
    }
}

/// Email metadata carried along with an invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSummary {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub timestamp: Option<String>,
}

/// An invoice found in the mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub email: EmailSummary,
    pub attachment_filename: String,
    pub fields: InvoiceFields,
    pub status: InvoiceStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Stable id for an attachment, so rescanning the inbox does not duplicate.
pub fn invoice_id(message_id: &str, attachment_id: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", message_id, attachment_id).as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_id_is_stable_and_short() {
        let a = invoice_id("m-1", "att-1");
        assert_eq!(a.len(), 16);
        assert_eq!(a, invoice_id("m-1", "att-1"));
        assert_ne!(a, invoice_id("m-1", "att-2"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn only_settled_or_running_invoices_are_not_payable() {
        assert!(InvoiceStatus::Pending.is_payable());
        assert!(InvoiceStatus::AwaitingFunds.is_payable());
        assert!(InvoiceStatus::Failed.is_payable());
        assert!(!InvoiceStatus::Paid.is_payable());
        assert!(!InvoiceStatus::Processing.is_payable());
    }
}
