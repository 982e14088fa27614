//! Prompt templates for the payment agent.

use crate::invoice::Invoice;
use crate::tools::ToolRegistry;

/// Build the system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful assistant that processes invoice payments.

## Your Tasks

1. Check the available balance before making any payment.
2. Search for the payee and verify it matches the invoice recipient.
3. Send the payment, or generate a checkout URL when the payee is not registered or funds are short.
4. Track and report the payment status.

## Tools

{tool_descriptions}

## Rules

1. **Always use tools** - Never assume a balance, payee ID or payment reference. Look it up.
2. **Never pay twice** - Send at most one payment per invoice.
3. **Amounts are dollars** - Pass amounts as decimal numbers, exactly as written on the invoice.
4. **Explain problems** - If something fails, say what went wrong and what the user can do next.

When you are done, reply with a short summary: amount, payee, payment reference or checkout URL, and status."#,
        tool_descriptions = tool_descriptions
    )
}

/// Instruction for paying one scanned invoice.
pub fn invoice_payment_task(invoice: &Invoice) -> String {
    let fields = &invoice.fields;
    let due = fields
        .due_date
        .as_deref()
        .map(|d| format!("\nDue date: {}", d))
        .unwrap_or_default();

    format!(
        r#"Pay this invoice.

Invoice number: {number}
Amount: ${amount:.2} {currency}
Recipient: {recipient}
Description: {memo}{due}
Email subject: {subject}
Sender: {sender}

Steps:
1. Check the balance.
2. Search for the payee "{recipient}".
3. If the payee is found, send ${amount:.2} to it with memo "{number}".
4. If the payee is not found, generate a checkout URL for ${amount:.2} with memo "{number}".
5. Report what happened."#,
        number = fields.invoice_number,
        amount = fields.amount,
        currency = fields.currency,
        recipient = fields.recipient,
        memo = fields.memo,
        due = due,
        subject = invoice.email.subject,
        sender = invoice.email.sender,
    )
}
