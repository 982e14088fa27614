use serde::{Deserialize, Deserializer, Serialize};

/// Returned when a mailbox link is started; the dashboard opens
/// `redirect_url` in a popup and keeps `connected_account_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    #[serde(rename(deserialize = "connectedAccountId"))]
    pub connected_account_id: String,
    #[serde(rename(deserialize = "redirectUrl"), default)]
    pub redirect_url: Option<String>,
    #[serde(rename(deserialize = "connectionStatus"), default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename(deserialize = "appName"), default)]
    pub app_name: Option<String>,
}

impl ConnectedAccount {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub attachment_id: String,
    pub mime_type: String,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.mime_type.to_lowercase().ends_with("pdf")
            || self.filename.to_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub message_id: String,
    pub thread_id: Option<String>,
    pub timestamp: Option<String>,
    pub subject: String,
    pub sender: String,
    pub preview: String,
    pub labels: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// Raw message shape inside a `GMAIL_FETCH_EMAILS` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub message_timestamp: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub preview: Option<RawPreview>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachment_list: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPreview {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawAttachment {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Gmail payloads send `null` for empty lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
