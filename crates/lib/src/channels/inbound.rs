//! Inbound event: one messaging event from a webhook delivery, classified by payload shape.

use crate::channels::messenger::MessagingEvent;

/// What the user sent, in classification precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Message text (trimmed). Takes priority over attachments.
    PlainText(String),
    /// First attachment is an image; `url` is None when the platform gave no usable link.
    ImageAttachment { url: Option<String> },
    /// Button tap with its payload string.
    Postback(String),
    /// Copy of a message the page itself sent.
    Echo,
    /// Anything else (stickers, audio, reactions); no reply.
    Unsupported,
}

/// A classified messaging event addressed back to `sender_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: String,
    /// Platform message id, used for duplicate suppression when present.
    pub mid: Option<String>,
    pub payload: EventPayload,
}

impl InboundEvent {
    /// Classify a raw messaging event. Returns None when the event has no sender id.
    pub fn from_messaging(event: &MessagingEvent) -> Option<Self> {
        let sender_id = event
            .sender
            .as_ref()
            .and_then(|s| s.id.clone())
            .filter(|id| !id.is_empty())?;
        let message = event.message.as_ref();
        let mid = message.and_then(|m| m.mid.clone()).filter(|m| !m.is_empty());

        let payload = match message {
            Some(m) if m.is_echo => EventPayload::Echo,
            Some(m) if m.text.is_some() => {
                EventPayload::PlainText(m.text.as_deref().unwrap_or("").trim().to_string())
            }
            Some(m) if m.first_attachment_type() == Some("image") => {
                EventPayload::ImageAttachment {
                    url: m.first_attachment_url().map(str::to_string),
                }
            }
            _ => match event.postback.as_ref().and_then(|p| p.payload.clone()) {
                Some(p) => EventPayload::Postback(p),
                None => EventPayload::Unsupported,
            },
        };

        Some(Self {
            sender_id,
            mid,
            payload,
        })
    }
}
