//! Push provider client.
//!
//! HTTP JSON client for an Expo-style push API: a batch submit returns one
//! ticket per message (positionally), and a later receipt lookup returns
//! final verdicts keyed by ticket id. Receipts expire provider-side, so a
//! missing receipt is expected behavior.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PushProviderConfig;

/// Errors from the push provider client. All of these are transport-level:
/// per-address rejections are carried inside tickets/receipts instead.
#[derive(Debug, Error)]
pub enum PushProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// One push message addressed to a single token.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub sound: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl PushMessage {
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            title: title.into(),
            body: body.into(),
            sound: "default".to_string(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Per-address submission outcome as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTicketStatus {
    Ok,
    Error,
}

/// One submission ticket, matched positionally to the submitted message.
#[derive(Debug, Clone)]
pub struct PushTicket {
    pub address: String,
    pub ticket_id: Option<String>,
    pub status: PushTicketStatus,
    /// Provider error code (e.g. "DeviceNotRegistered") when status is Error
    pub error_code: Option<String>,
}

/// Final receipt status for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushReceiptStatus {
    Ok,
    Error,
}

/// One delivery receipt, keyed by ticket id.
#[derive(Debug, Clone)]
pub struct PushReceipt {
    pub ticket_id: String,
    pub status: PushReceiptStatus,
    pub error_code: Option<String>,
}

/// Client for the push provider's submit and receipt endpoints.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Syntactic token check, performed locally before any network call.
    fn validate_address(&self, token: &str) -> bool;

    /// Submit one chunk of messages. Returns exactly one ticket per
    /// message, in input order.
    async fn send_batch(
        &self,
        messages: &[PushMessage],
    ) -> Result<Vec<PushTicket>, PushProviderError>;

    /// Look up receipts for previously issued ticket ids. Ids the provider
    /// no longer knows about are simply absent from the result.
    async fn fetch_receipts(
        &self,
        ticket_ids: &[String],
    ) -> Result<Vec<PushReceipt>, PushProviderError>;
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct SendResponse {
    data: Vec<SendResponseEntry>,
}

#[derive(Debug, Deserialize)]
struct SendResponseEntry {
    status: String,
    id: Option<String>,
    #[allow(dead_code)]
    message: Option<String>,
    details: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReceiptRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    data: HashMap<String, ReceiptResponseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResponseEntry {
    status: String,
    #[allow(dead_code)]
    message: Option<String>,
    details: Option<ErrorDetails>,
}

// ============================================================================
// HTTP client
// ============================================================================

/// Production push client speaking the provider's HTTP JSON API.
pub struct HttpPushClient {
    http: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
}

impl HttpPushClient {
    pub fn new(config: &PushProviderConfig) -> Result<Self, PushProviderError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.request_timeout_seconds,
            ))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    fn validate_address(&self, token: &str) -> bool {
        (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
            && token.ends_with(']')
    }

    async fn send_batch(
        &self,
        messages: &[PushMessage],
    ) -> Result<Vec<PushTicket>, PushProviderError> {
        let url = format!("{}/push/send", self.api_url);
        let response = self
            .authorize(self.http.post(&url))
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushProviderError::UnexpectedStatus(status.as_u16()));
        }

        let body: SendResponse = response.json().await?;
        if body.data.len() != messages.len() {
            return Err(PushProviderError::Decode(format!(
                "expected {} tickets, provider returned {}",
                messages.len(),
                body.data.len()
            )));
        }

        // Tickets come back positionally, one per submitted message
        let tickets = messages
            .iter()
            .zip(body.data)
            .map(|(message, entry)| {
                if entry.status == "ok" {
                    PushTicket {
                        address: message.to.clone(),
                        ticket_id: entry.id,
                        status: PushTicketStatus::Ok,
                        error_code: None,
                    }
                } else {
                    PushTicket {
                        address: message.to.clone(),
                        ticket_id: None,
                        status: PushTicketStatus::Error,
                        error_code: entry.details.and_then(|d| d.error),
                    }
                }
            })
            .collect();

        Ok(tickets)
    }

    async fn fetch_receipts(
        &self,
        ticket_ids: &[String],
    ) -> Result<Vec<PushReceipt>, PushProviderError> {
        let url = format!("{}/push/getReceipts", self.api_url);
        let response = self
            .authorize(self.http.post(&url))
            .json(&ReceiptRequest { ids: ticket_ids })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushProviderError::UnexpectedStatus(status.as_u16()));
        }

        let body: ReceiptResponse = response.json().await?;

        let receipts = body
            .data
            .into_iter()
            .map(|(ticket_id, entry)| {
                let (status, error_code) = if entry.status == "ok" {
                    (PushReceiptStatus::Ok, None)
                } else {
                    (
                        PushReceiptStatus::Error,
                        entry.details.and_then(|d| d.error),
                    )
                };
                PushReceipt {
                    ticket_id,
                    status,
                    error_code,
                }
            })
            .collect();

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HttpPushClient {
        HttpPushClient::new(&PushProviderConfig::default()).unwrap()
    }

    #[test]
    fn test_token_validation() {
        let client = test_client();
        assert!(client.validate_address("ExponentPushToken[abc123]"));
        assert!(client.validate_address("ExpoPushToken[abc123]"));
        assert!(!client.validate_address("ExponentPushToken[abc123"));
        assert!(!client.validate_address("not-a-token"));
        assert!(!client.validate_address(""));
    }

    #[test]
    fn test_send_response_decoding() {
        let raw = r#"{
            "data": [
                {"status": "ok", "id": "ticket-1"},
                {"status": "error", "message": "gone", "details": {"error": "DeviceNotRegistered"}}
            ]
        }"#;
        let parsed: SendResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].id.as_deref(), Some("ticket-1"));
        assert_eq!(
            parsed.data[1]
                .details
                .as_ref()
                .and_then(|d| d.error.as_deref()),
            Some("DeviceNotRegistered")
        );
    }

    #[test]
    fn test_receipt_response_decoding() {
        let raw = r#"{
            "data": {
                "ticket-1": {"status": "ok"},
                "ticket-2": {"status": "error", "details": {"error": "MessageRateExceeded"}}
            }
        }"#;
        let parsed: ReceiptResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data["ticket-1"].status, "ok");
    }

    #[test]
    fn test_message_serialization_omits_null_data() {
        let message = PushMessage::new("ExponentPushToken[abc]", "Title", "Body");
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("data").is_none());

        let with_data = message.with_data(serde_json::json!({"event_id": "e-1"}));
        let json = serde_json::to_value(&with_data).unwrap();
        assert!(json.get("data").is_some());
    }
}
