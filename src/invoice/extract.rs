//! Invoice field extraction from plain text.
//!
//! Works on whatever text the PDF layer produced, so every field has an
//! ordered list of patterns and a looser fallback.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_RECIPIENT: &str = "UNKNOWN RECIPIENT";
pub const DEFAULT_MEMO: &str = "Software Development Services";

/// Payable fields pulled out of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub invoice_number: String,
    pub amount: f64,
    pub currency: String,
    pub recipient: String,
    pub memo: String,
    pub due_date: Option<String>,
}

impl InvoiceFields {
    pub fn has_recipient(&self) -> bool {
        self.recipient != UNKNOWN_RECIPIENT
    }
}

const AMOUNT: &str = r"(\d+(?:,\d{3})*(?:\.\d{2})?)";

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?im){}", p)).expect("static invoice pattern"))
        .collect()
}

fn invoice_number_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"INVOICE\s*(?:NO\.?|NUMBER:?|#)\s*#?([A-Z0-9][-A-Z0-9]*)",
            r"INV[:\s.-]*([A-Z0-9][-A-Z0-9]*)",
            r"INVOICE\s*ID[:\s]*([A-Z0-9][-A-Z0-9]*)",
            r"#\s*([A-Z0-9][-A-Z0-9]*)",
        ])
    })
}

fn amount_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let patterns = [
            format!(r"Balance\s*Due:?\s*\$?\s*{AMOUNT}"),
            format!(r"(?:TOTAL|SUBTOTAL):?\s*(?:USD|\$)?\s*{AMOUNT}"),
            format!(r"(?:Amount|Sum)\s*(?:Due|Payable|:)?:?\s*(?:USD|\$)?\s*{AMOUNT}"),
            format!(r"(?:USD|\$)\s*{AMOUNT}"),
        ];
        compile(&patterns.iter().map(String::as_str).collect::<Vec<_>>())
    })
}

fn any_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\$?\s*{AMOUNT}")).expect("static amount pattern"))
}

fn invoice_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(?:^|\s)([A-Z0-9][-A-Z0-9]{2,})").expect("static token pattern"))
}

fn name_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z&.,' ]*[A-Za-z.]$").expect("static name pattern"))
}

fn capitalised_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,3})[ \t]*$").expect("static name pattern")
    })
}

fn due_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)DUE\s*DATE[:\s]*([^\n]+)").expect("static due date pattern"))
}

/// Header line introducing a block, in priority order for the recipient.
fn recipient_headers() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"^\s*(?:PAY\s*TO|PAYEE|VENDOR|SUPPLIER|FROM)\b[:\s]*(.*)$",
            r"^\s*BILL(?:ED)?\s*TO\b[:\s]*(.*)$",
            r"^\s*(?:COMPANY|BUSINESS)\b[:\s]*(.*)$",
        ])
    })
}

fn memo_headers() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(&[
            r"^\s*PROJECT\s+DETAILS?\b[:\s]*(.*)$",
            r"^\s*(?:DESCRIPTION|DETAILS)\b[:\s]*(.*)$",
            r"^\s*(?:SERVICE|WORK)\s*DESCRIPTION\b[:\s]*(.*)$",
            r"^\s*(?:ITEM|PRODUCT)\b[:\s]*(.*)$",
        ])
    })
}

/// Extract payable fields, or `None` when no positive amount is present.
pub fn extract_fields(text: &str) -> Option<InvoiceFields> {
    extract_fields_at(text, Utc::now())
}

/// Like [`extract_fields`] with an explicit clock for generated numbers.
pub fn extract_fields_at(text: &str, now: DateTime<Utc>) -> Option<InvoiceFields> {
    let amount = find_amount(text)?;
    let (recipient, company) = find_recipient(text);
    let invoice_number = find_invoice_number(text, company.as_deref(), now);

    let fields = InvoiceFields {
        invoice_number,
        amount,
        currency: "USD".to_string(),
        recipient: recipient.unwrap_or_else(|| UNKNOWN_RECIPIENT.to_string()),
        memo: find_memo(text).unwrap_or_else(|| DEFAULT_MEMO.to_string()),
        due_date: due_date()
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    if !fields.has_recipient() {
        tracing::warn!(invoice = %fields.invoice_number, "No recipient name found in invoice");
    }
    Some(fields)
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|a| *a > 0.0)
}

fn find_amount(text: &str) -> Option<f64> {
    for re in amount_patterns() {
        if let Some(caps) = re.captures(text) {
            if let Some(amount) = parse_amount(&caps[1]) {
                return Some(amount);
            }
        }
    }

    // Largest figure on any line that talks about a total.
    text.lines()
        .filter(|line| {
            let upper = line.to_uppercase();
            ["TOTAL", "AMOUNT", "DUE", "BALANCE"]
                .iter()
                .any(|k| upper.contains(k))
        })
        .flat_map(|line| any_amount().captures_iter(line))
        .filter_map(|c| parse_amount(&c[1]))
        .fold(None, |best: Option<f64>, a| Some(best.map_or(a, |b| b.max(a))))
}

fn find_invoice_number(text: &str, company: Option<&str>, now: DateTime<Utc>) -> String {
    let found = invoice_number_patterns()
        .iter()
        .filter_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())
        .find(|v| !v.is_empty() && !v.chars().all(|ch| ch.is_alphabetic()))
        .or_else(|| invoice_token().captures(text).map(|c| c[1].to_string()));

    let Some(number) = found else {
        return format!("AUTO-{}", now.format("%Y%m%d%H%M%S"));
    };

    if !number.chars().all(|c| c.is_ascii_digit()) {
        return number;
    }

    // Bare numbers collide across vendors; qualify them.
    let initials: String = company
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if initials.is_empty() {
        format!("INV-{}-{}", now.format("%Y%m"), number)
    } else {
        format!("{}-{}", initials, number)
    }
}

/// Recipient name and, when the block has a second name line, the company.
fn find_recipient(text: &str) -> (Option<String>, Option<String>) {
    let lines: Vec<&str> = text.lines().collect();

    for header in recipient_headers() {
        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = header.captures(line) else {
                continue;
            };
            let inline = caps[1].trim();
            let mut names = std::iter::once(inline)
                .chain(lines[i + 1..].iter().map(|l| l.trim()))
                .filter(|l| !l.is_empty())
                .take(3)
                .filter(|l| is_name(l));
            if let Some(name) = names.next() {
                return (Some(name.to_string()), names.next().map(str::to_string));
            }
        }
    }

    let fallback = capitalised_name()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|name| {
            let upper = name.to_uppercase();
            !["INVOICE", "BILL", "TOTAL", "DESCRIPTION"]
                .iter()
                .any(|h| upper.contains(h))
        });
    (fallback, None)
}

fn is_name(line: &str) -> bool {
    line.len() > 1 && name_line().is_match(line)
}

fn find_memo(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    for header in memo_headers() {
        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = header.captures(line) else {
                continue;
            };
            let inline = caps[1].trim();
            let candidate = std::iter::once(inline)
                .chain(lines[i + 1..].iter().map(|l| l.trim()))
                .find(|l| !l.is_empty() && l.len() > 1 && !is_header_noise(l));
            if let Some(memo) = candidate {
                return Some(memo.to_string());
            }
        }
    }
    None
}

fn is_header_noise(line: &str) -> bool {
    let upper = line.to_uppercase();
    ["INVOICE", "TOTAL", "BALANCE", "DATE"]
        .iter()
        .any(|w| upper.contains(w))
}
