//! Paced, ordered delivery of a reply as one or more chunks.

use crate::channels::ChannelHandle;
use crate::delivery::chunk::{chunk_text, DEFAULT_CHUNK_LIMIT};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of delivering one reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends replies through a channel, chunked and paced.
#[derive(Clone)]
pub struct OutboundSender {
    channel: Arc<dyn ChannelHandle>,
    chunk_limit: usize,
    delay: Duration,
}

impl OutboundSender {
    pub fn new(channel: Arc<dyn ChannelHandle>, chunk_limit: usize, delay: Duration) -> Self {
        Self {
            channel,
            chunk_limit,
            delay,
        }
    }

    /// Sender with the default chunk limit and no pacing.
    pub fn unpaced(channel: Arc<dyn ChannelHandle>) -> Self {
        Self::new(channel, DEFAULT_CHUNK_LIMIT, Duration::ZERO)
    }

    /// Send `text` to `recipient` chunk by chunk, in order. A failed chunk is logged and
    /// the remaining chunks are still sent.
    pub async fn send_reply(&self, recipient: &str, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (i, chunk) in chunk_text(text, self.chunk_limit).iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.channel.send_message(recipient, chunk).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::warn!(
                        "{}: send to {} failed (chunk {}): {}",
                        self.channel.id(),
                        recipient,
                        i + 1,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}
