//! # Invoice Agent
//!
//! Finds PDF invoices in a linked Gmail mailbox and pays them.
//!
//! This library provides:
//! - A connector-platform client for Gmail (link a mailbox, fetch emails,
//!   download attachments)
//! - Invoice text extraction and field parsing
//! - A payments API client and the agent tools built on it
//! - A tool-based agent loop that pays invoices through those tools
//! - An HTTP API and dashboard with an in-memory payment history
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Scan the mailbox and keep pending invoices
//! 2. Build context with the payment system prompt and tools
//! 3. Call the LLM, execute any tool calls, feed results back
//! 4. Record what the tools actually did in the payment history
//!
//! ## Example
//!
//! ```rust,ignore
//! use invoice_agent::{config::Config, processor::InvoiceProcessor};
//!
//! let config = Config::from_env()?;
//! let processor = InvoiceProcessor::new(&config);
//! processor.scan_inbox("ca_123", None, None).await?;
//! let report = processor.process_pending().await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod connector;
pub mod history;
pub mod invoice;
pub mod llm;
pub mod payments;
pub mod processor;
pub mod tools;

pub use config::Config;
