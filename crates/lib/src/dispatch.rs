//! Event dispatcher: turns one webhook delivery into at most one reply per messaging event.
//!
//! Per event: skip echoes and sender-less events, gate on the duplicate cache when the
//! event carries a message id, classify (text > image > postback), solve, and deliver.

use crate::channels::{
    EventPayload, HttpImageFetcher, ImageFetcher, InboundEvent, MessagingEvent, MessengerChannel,
    WebhookPayload,
};
use crate::config::{self, Config};
use crate::dedup::{DuplicateCache, FileStore};
use crate::delivery::{DeliveryReport, OutboundSender};
use crate::solve::{SolveRequest, Solver};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Reply for an image attachment that has no usable link or could not be downloaded.
pub const NO_VALID_LINK: &str = "I received an image but no valid link. Please resend it clearly.";

/// What happened to one messaging event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Echo,
    NoSender,
    Duplicate,
    Unsupported,
    Replied(DeliveryReport),
}

/// Answer the subscription handshake: the challenge when mode is "subscribe" and the token
/// matches, otherwise None. Accepts both `hub.mode` and `hub_mode` style keys.
pub fn verify_handshake(params: &HashMap<String, String>, verify_token: &str) -> Option<String> {
    let get = |name: &str| {
        params
            .get(&format!("hub.{}", name))
            .or_else(|| params.get(&format!("hub_{}", name)))
            .map(String::as_str)
            .unwrap_or("")
    };
    if get("mode") == "subscribe" && get("verify_token") == verify_token {
        Some(get("challenge").to_string())
    } else {
        None
    }
}

/// Wires the duplicate cache, solve pipeline, attachment fetcher, and outbound sender.
#[derive(Clone)]
pub struct Dispatcher {
    cache: DuplicateCache,
    solver: Solver,
    fetcher: Arc<dyn ImageFetcher>,
    sender: OutboundSender,
}

impl Dispatcher {
    pub fn new(
        cache: DuplicateCache,
        solver: Solver,
        fetcher: Arc<dyn ImageFetcher>,
        sender: OutboundSender,
    ) -> Self {
        Self {
            cache,
            solver,
            fetcher,
            sender,
        }
    }

    /// Production wiring: file-backed duplicate cache, configured solver, HTTP image
    /// downloads, and Messenger delivery.
    pub fn from_config(config: &Config, config_path: &Path) -> Self {
        let cache = DuplicateCache::new(
            Arc::new(FileStore::new(config::resolve_dedup_path(config, config_path))),
            config.dedup.limit,
        );
        let messenger = &config.messenger;
        let channel = MessengerChannel::new(
            Some(messenger.api_base.clone()),
            config::resolve_page_access_token(config),
        )
        .with_timeout(Duration::from_secs(messenger.timeout_secs));
        let sender = OutboundSender::new(
            Arc::new(channel),
            messenger.chunk_limit,
            messenger.send_delay(),
        );
        Self::new(
            cache,
            Solver::from_config(config),
            Arc::new(HttpImageFetcher::new()),
            sender,
        )
    }

    /// Handle a raw POST body. Malformed or entry-less bodies are ignored.
    pub async fn handle_body(&self, body: &[u8]) -> Vec<EventOutcome> {
        match serde_json::from_slice::<WebhookPayload>(body) {
            Ok(payload) => self.handle_payload(&payload).await,
            Err(e) => {
                log::debug!("dispatch: ignoring unparseable webhook body: {}", e);
                Vec::new()
            }
        }
    }

    /// Handle every messaging event of a delivery, sequentially.
    pub async fn handle_payload(&self, payload: &WebhookPayload) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        for event in payload.events() {
            outcomes.push(self.handle_event(&event).await);
        }
        outcomes
    }

    pub async fn handle_event(&self, event: &MessagingEvent) -> EventOutcome {
        let Some(inbound) = InboundEvent::from_messaging(event) else {
            log::debug!("dispatch: skipping event without sender id");
            return EventOutcome::NoSender;
        };
        if inbound.payload == EventPayload::Echo {
            return EventOutcome::Echo;
        }
        if let Some(ref mid) = inbound.mid {
            if self.cache.seen(mid).await {
                log::debug!("dispatch: duplicate delivery of {}, skipping", mid);
                return EventOutcome::Duplicate;
            }
            self.cache.mark(mid).await;
        }

        let reply = match inbound.payload {
            EventPayload::PlainText(ref text) => {
                log::info!("dispatch: text problem from {}", inbound.sender_id);
                self.solver.solve(&SolveRequest::Text(text.clone())).await
            }
            EventPayload::ImageAttachment { ref url } => self.image_reply(url.as_deref()).await,
            EventPayload::Postback(ref payload) => format!("Tapped: {}", payload),
            EventPayload::Echo | EventPayload::Unsupported => return EventOutcome::Unsupported,
        };
        EventOutcome::Replied(self.sender.send_reply(&inbound.sender_id, &reply).await)
    }

    async fn image_reply(&self, url: Option<&str>) -> String {
        let Some(url) = url else {
            return NO_VALID_LINK.to_string();
        };
        match self.fetcher.fetch(url).await {
            Ok(image) => {
                log::info!("dispatch: image problem ({} bytes, {})", image.bytes.len(), image.mime);
                self.solver
                    .solve(&SolveRequest::Image {
                        bytes: image.bytes,
                        mime: image.mime,
                    })
                    .await
            }
            Err(e) => {
                log::warn!("dispatch: {}", e);
                NO_VALID_LINK.to_string()
            }
        }
    }
}
