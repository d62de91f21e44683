//! Messenger channel: webhook payload types and replies via the Send API.

use crate::channels::handle::ChannelHandle;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

const MESSENGER_API_BASE: &str = "https://graph.facebook.com/v19.0";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Webhook POST body: `{ "object": "page", "entry": [ { "messaging": [ ... ] } ] }`.
///
/// Entries and events stay raw until [`WebhookPayload::events`] so one malformed event
/// does not take its siblings down with it.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub entry: Vec<Value>,
}

impl WebhookPayload {
    /// Messaging events across entries, in delivery order. Entries without a `messaging`
    /// array and events that do not match the expected shape are skipped.
    pub fn events(&self) -> Vec<MessagingEvent> {
        let mut events = Vec::new();
        for entry in &self.entry {
            let Some(messaging) = entry.get("messaging").and_then(Value::as_array) else {
                continue;
            };
            for raw in messaging {
                match MessagingEvent::deserialize(raw) {
                    Ok(event) => events.push(event),
                    Err(e) => log::debug!("messenger: skipping malformed messaging event: {}", e),
                }
            }
        }
        events
    }
}

/// One messaging event (message, echo, or postback).
#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<Party>,
    #[serde(default)]
    pub message: Option<MessengerMessage>,
    #[serde(default)]
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessengerMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub is_echo: bool,
}

impl MessengerMessage {
    /// Type of the first attachment (e.g. "image", "audio").
    pub fn first_attachment_type(&self) -> Option<&str> {
        self.attachments
            .as_ref()
            .and_then(|a| a.first())
            .and_then(|a| a.typ.as_deref())
    }

    /// Non-empty payload URL of the first attachment.
    pub fn first_attachment_url(&self) -> Option<&str> {
        self.attachments
            .as_ref()
            .and_then(|a| a.first())
            .and_then(|a| a.payload.as_ref())
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: Option<String>,
}

/// Ids arrive as strings, but tolerate numbers.
fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Messenger connector: sends replies with the page access token.
pub struct MessengerChannel {
    id: String,
    api_base: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl MessengerChannel {
    pub fn new(api_base: Option<String>, token: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| MESSENGER_API_BASE.to_string());
        Self {
            id: "messenger".to_string(),
            api_base,
            token,
            timeout: SEND_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a text message to a PSID via POST /me/messages.
    pub async fn send_text(&self, psid: &str, text: &str) -> Result<(), String> {
        let token = self
            .token
            .as_ref()
            .ok_or("messenger page access token not configured")?;
        let url = format!("{}/me/messages", self.api_base);
        let body = serde_json::json!({
            "recipient": { "id": psid },
            "messaging_type": "RESPONSE",
            "message": { "text": text },
        });
        let res = self
            .client
            .post(&url)
            .query(&[("access_token", token.as_str())])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("send API failed: {} {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for MessengerChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String> {
        self.send_text(conversation_id, text).await
    }
}
