//! LLM access: chat-completion wire types, the backend trait, and the inference client
//! that applies the one-shot model fallback.

mod client;
mod openai;

pub use client::InferenceClient;
pub use openai::{extract_content, OpenAiClient};

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion response malformed: {0}")]
    Decode(String),
    #[error("completion response had no message content")]
    EmptyContent,
}

/// A completion service that turns one invocation into assistant text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, invocation: &ModelInvocation) -> Result<String, LlmError>;
}

/// One chat message (system or user).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Plain string content or a multi-part list (text and images).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Image inlined as a base64 data URL.
    pub fn image_data(bytes: &[u8], mime: &str) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", mime, b64),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// Model, ordered messages, and sampling for a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInvocation {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl ModelInvocation {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, sampling: SamplingParams) -> Self {
        Self {
            model: model.into(),
            messages,
            sampling,
        }
    }

    /// Same messages and sampling against another model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}
