use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered payment destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub payee_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of a successful send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub status: Option<String>,
}

impl PaymentReceipt {
    pub(super) fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            reference: str_field(value, &["reference", "paymentId", "id"])?,
            status: str_field(value, &["status"]),
        })
    }
}

/// A payment as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub reference: String,
    pub status: Option<String>,
    pub amount: Option<f64>,
    pub memo: Option<String>,
}

impl PaymentStatus {
    pub(super) fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            reference: str_field(value, &["reference", "paymentId", "id"])?,
            status: str_field(value, &["status"]),
            amount: ["amountDecimal", "amount"]
                .iter()
                .find_map(|k| value.get(*k).and_then(Value::as_f64)),
            memo: str_field(value, &["memo"]),
        })
    }
}

/// First non-empty string among `keys`.
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
