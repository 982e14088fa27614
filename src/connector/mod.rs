//! Connector platform client (Gmail access).
//!
//! Mailbox access is brokered by the connector: we start an OAuth-style link
//! for the Gmail integration, then execute Gmail actions on behalf of the
//! resulting connected account.

mod types;

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::NaiveDateTime;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ConnectorConfig;

pub use types::{Attachment, ConnectedAccount, ConnectionRequest, EmailMessage};
use types::RawMessage;

pub const FETCH_EMAILS_ACTION: &str = "GMAIL_FETCH_EMAILS";
pub const GET_ATTACHMENT_ACTION: &str = "GMAIL_GET_ATTACHMENT";

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("connector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connector action {action} failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("unexpected connector response: {0}")]
    Decode(String),

    #[error("no Gmail integration configured (set COMPOSIO_GMAIL_INTEGRATION_ID)")]
    MissingIntegration,

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}

pub struct ConnectorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    gmail_integration_id: Option<String>,
}

impl ConnectorClient {
    pub fn new(config: &ConnectorConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            gmail_integration_id: config.gmail_integration_id.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, ConnectorError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Connector API error");
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Start linking a Gmail mailbox.
    pub async fn initiate_connection(
        &self,
        redirect_uri: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<ConnectionRequest, ConnectorError> {
        let integration_id = self
            .gmail_integration_id
            .as_deref()
            .ok_or(ConnectorError::MissingIntegration)?;
        let req = self.request(Method::POST, "/v1/connectedAccounts").json(&json!({
            "integrationId": integration_id,
            "entityId": entity_id.unwrap_or("default"),
            "redirectUri": redirect_uri,
        }));
        let value = self.send(req).await?;
        serde_json::from_value(value).map_err(|e| ConnectorError::Decode(e.to_string()))
    }

    pub async fn connection_status(
        &self,
        account_id: &str,
    ) -> Result<ConnectedAccount, ConnectorError> {
        let value = self
            .send(self.request(
                Method::GET,
                &format!("/v1/connectedAccounts/{}", path_segment(account_id)?),
            ))
            .await?;
        serde_json::from_value(value).map_err(|e| ConnectorError::Decode(e.to_string()))
    }

    /// Execute a connector action and return its `data` payload.
    pub async fn execute_action(
        &self,
        action: &str,
        account_id: &str,
        input: Value,
    ) -> Result<Value, ConnectorError> {
        tracing::debug!(action, account_id, "Executing connector action");
        let req = self
            .request(Method::POST, &format!("/v2/actions/{}/execute", path_segment(action)?))
            .json(&json!({
                "connectedAccountId": account_id,
                "input": input,
            }));
        let mut value = self.send(req).await?;

        let successful = value
            .get("successful")
            .or_else(|| value.get("successfull"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !successful {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ConnectorError::ActionFailed {
                action: action.to_string(),
                message,
            });
        }

        Ok(value
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Search the mailbox with a Gmail query.
    pub async fn fetch_emails(
        &self,
        account_id: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<EmailMessage>, ConnectorError> {
        let data = self
            .execute_action(
                FETCH_EMAILS_ACTION,
                account_id,
                json!({
                    "query": query,
                    "max_results": max_results,
                    "user_id": "me",
                    "include_spam_trash": false,
                }),
            )
            .await?;
        parse_messages(&data)
    }

    /// Download an attachment's raw bytes.
    pub async fn download_attachment(
        &self,
        account_id: &str,
        message_id: &str,
        attachment_id: &str,
        filename: &str,
    ) -> Result<Vec<u8>, ConnectorError> {
        let data = self
            .execute_action(
                GET_ATTACHMENT_ACTION,
                account_id,
                json!({
                    "message_id": message_id,
                    "attachment_id": attachment_id,
                    "file_name": filename,
                    "user_id": "me",
                }),
            )
            .await?;

        let encoded = [
            data.get("file"),
            data.get("data"),
            data.pointer("/attachment/data"),
            data.pointer("/file/content"),
        ]
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .ok_or_else(|| ConnectorError::Decode(format!("no file data for {}", filename)))?;

        decode_base64(encoded)
            .ok_or_else(|| ConnectorError::Decode(format!("attachment {} is not base64", filename)))
    }
}

/// Percent-encode one URL path segment. Empty and dot segments are refused.
fn path_segment(value: &str) -> Result<String, ConnectorError> {
    match value {
        "" | "." | ".." => Err(ConnectorError::InvalidIdentifier(value.to_string())),
        _ => Ok(urlencoding::encode(value).into_owned()),
    }
}

fn parse_messages(data: &Value) -> Result<Vec<EmailMessage>, ConnectorError> {
    let messages = data
        .pointer("/response_data/messages")
        .or_else(|| data.get("messages"))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    let raw: Vec<RawMessage> =
        serde_json::from_value(messages).map_err(|e| ConnectorError::Decode(e.to_string()))?;

    Ok(raw
        .into_iter()
        .filter_map(|m| {
            Some(EmailMessage {
                message_id: m.message_id?,
                thread_id: m.thread_id,
                timestamp: m.message_timestamp.as_deref().map(format_timestamp),
                subject: m.subject.unwrap_or_default(),
                sender: m.sender.unwrap_or_default(),
                preview: m.preview.and_then(|p| p.body).unwrap_or_default(),
                labels: m.label_ids,
                attachments: m
                    .attachment_list
                    .into_iter()
                    .map(|a| Attachment {
                        filename: a.filename.unwrap_or_default(),
                        attachment_id: a.attachment_id.unwrap_or_default(),
                        mime_type: a.mime_type.unwrap_or_default(),
                    })
                    .collect(),
            })
        })
        .collect())
}

/// `2024-09-21T10:00:00Z` becomes `2024-09-21 10:00:00`; other forms pass through.
pub fn format_timestamp(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(&cleaned)
        .or_else(|_| URL_SAFE.decode(&cleaned))
        .or_else(|_| URL_SAFE_NO_PAD.decode(&cleaned))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ConnectorClient {
        ConnectorClient::new(&ConnectorConfig {
            api_key: "ck".to_string(),
            base_url: server.url(""),
            gmail_integration_id: Some("gmail-int".to_string()),
        })
    }

    #[test]
    fn timestamps_are_normalised_when_iso() {
        assert_eq!(format_timestamp("2024-09-21T10:05:00Z"), "2024-09-21 10:05:00");
        assert_eq!(format_timestamp("1726912800"), "1726912800");
    }

    #[test]
    fn base64_accepts_standard_and_url_safe() {
        assert_eq!(decode_base64("aGVsbG8=").as_deref(), Some(&b"hello"[..]));
        assert_eq!(decode_base64("_-8").as_deref(), Some(&[0xff, 0xef][..]));
        assert!(decode_base64("***").is_none());
    }

    #[test]
    fn attachment_pdf_detection_uses_mime_or_extension() {
        let by_mime = Attachment {
            filename: "scan".to_string(),
            attachment_id: "a".to_string(),
            mime_type: "application/PDF".to_string(),
        };
        let by_name = Attachment {
            filename: "Invoice.PDF".to_string(),
            attachment_id: "b".to_string(),
            mime_type: "application/octet-stream".to_string(),
        };
        let image = Attachment {
            filename: "logo.png".to_string(),
            attachment_id: "c".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(by_mime.is_pdf());
        assert!(by_name.is_pdf());
        assert!(!image.is_pdf());
    }

    #[tokio::test]
    async fn initiate_connection_posts_integration() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/connectedAccounts")
                    .header("x-api-key", "ck")
                    .json_body_partial(r#"{"integrationId": "gmail-int", "entityId": "default"}"#);
                then.status(200).json_body(json!({
                    "connectionStatus": "INITIATED",
                    "connectedAccountId": "ca-1",
                    "redirectUrl": "https://accounts.example/oauth"
                }));
            })
            .await;

        let request = client(&server)
            .initiate_connection(None, None)
            .await
            .expect("connection");
        mock.assert_async().await;
        assert_eq!(request.connected_account_id, "ca-1");
        assert_eq!(request.redirect_url.as_deref(), Some("https://accounts.example/oauth"));
    }

    #[tokio::test]
    async fn fetch_emails_reads_nested_response_data() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/actions/GMAIL_FETCH_EMAILS/execute")
                    .json_body_partial(r#"{"connectedAccountId": "ca-1"}"#);
                then.status(200).json_body(json!({
                    "successfull": true,
                    "data": {"response_data": {"messages": [{
                        "messageId": "m-1",
                        "threadId": "t-1",
                        "messageTimestamp": "2024-09-21T10:05:00Z",
                        "subject": "Invoice September",
                        "sender": "billing@slingshot.ai",
                        "labelIds": ["INBOX"],
                        "preview": {"body": "Please find attached"},
                        "attachmentList": [{
                            "filename": "Invoice.pdf",
                            "attachmentId": "att-1",
                            "mimeType": "application/pdf"
                        }]
                    }, {
                        "subject": "no id, skipped"
                    }]}}
                }));
            })
            .await;

        let emails = client(&server)
            .fetch_emails("ca-1", "subject:invoice", 5)
            .await
            .expect("emails");
        assert_eq!(emails.len(), 1);
        let email = &emails[0];
        assert_eq!(email.message_id, "m-1");
        assert_eq!(email.timestamp.as_deref(), Some("2024-09-21 10:05:00"));
        assert_eq!(email.attachments[0].attachment_id, "att-1");
    }

    #[tokio::test]
    async fn failed_action_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/actions/GMAIL_GET_ATTACHMENT/execute");
                then.status(200)
                    .json_body(json!({"successful": false, "error": "account not active"}));
            })
            .await;

        let err = client(&server)
            .download_attachment("ca-1", "m-1", "att-1", "Invoice.pdf")
            .await
            .expect_err("inactive account");
        match err {
            ConnectorError::ActionFailed { action, message } => {
                assert_eq!(action, GET_ATTACHMENT_ACTION);
                assert_eq!(message, "account not active");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn download_attachment_decodes_file_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v2/actions/GMAIL_GET_ATTACHMENT/execute");
                then.status(200)
                    .json_body(json!({"successful": true, "data": {"file": "JVBERi0="}}));
            })
            .await;

        let bytes = client(&server)
            .download_attachment("ca-1", "m-1", "att-1", "Invoice.pdf")
            .await
            .expect("bytes");
        assert_eq!(bytes, b"%PDF-");
    }

    #[tokio::test]
    async fn account_ids_cannot_escape_their_segment() {
        let server = MockServer::start_async().await;
        let action = server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/actions/GMAIL_FETCH_EMAILS/execute");
                then.status(200).json_body(json!({"id": "x", "status": "ACTIVE"}));
            })
            .await;
        let client = client(&server);

        let traversal = client
            .connection_status("../../v2/actions/GMAIL_FETCH_EMAILS/execute")
            .await;
        assert!(traversal.is_err());
        action.assert_hits_async(0).await;

        let dots = client.connection_status("..").await.expect_err("dot segment");
        assert!(matches!(dots, ConnectorError::InvalidIdentifier(_)));
    }

    #[test]
    fn null_lists_in_messages_are_empty() {
        let data = json!({"messages": [
            {"messageId": "m-1", "labelIds": null, "attachmentList": null},
            {"messageId": "m-2", "attachmentList": [
                {"filename": "a.pdf", "attachmentId": "att-2", "mimeType": "application/pdf"}
            ]}
        ]});

        let emails = parse_messages(&data).expect("messages");

        assert_eq!(emails.len(), 2);
        assert!(emails[0].attachments.is_empty());
        assert!(emails[0].labels.is_empty());
        assert_eq!(emails[1].attachments[0].filename, "a.pdf");
    }
}
