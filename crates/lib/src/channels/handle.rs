//! Channel handle: the outbound seam the dispatcher and delivery code talk to.

use async_trait::async_trait;

/// Handle to a messaging channel that can deliver text to a conversation.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "messenger"), used in log lines.
    fn id(&self) -> &str;
    /// Send one text message to a conversation (e.g. a Messenger PSID).
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String>;
}
