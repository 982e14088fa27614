//! Agent module - the payment agent.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and the task
//! 2. Call the LLM with the payment tools
//! 3. If the LLM requests a tool call, execute it and feed the result back
//! 4. Repeat until the LLM produces a final answer or max iterations is reached

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentRun};
pub use prompt::{build_system_prompt, invoice_payment_task};
