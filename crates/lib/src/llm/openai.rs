//! OpenAI-compatible chat completions client (POST {base_url}/chat/completions).

use crate::llm::{ChatMessage, LlmBackend, LlmError, ModelInvocation, SamplingParams};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for an OpenAI-compatible completion API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST /chat/completions, non-streaming.
    async fn chat_completion(&self, invocation: &ModelInvocation) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model: &invocation.model,
            messages: &invocation.messages,
            sampling: &invocation.sampling,
        };
        let mut req = self.client.post(&url).timeout(self.timeout).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let text = res.text().await?;
        let data: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;
        extract_content(&data)
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    async fn complete(&self, invocation: &ModelInvocation) -> Result<String, LlmError> {
        self.chat_completion(invocation).await
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    sampling: &'a SamplingParams,
}

/// Pull `choices[0].message.content` out of a completion response.
///
/// Content may be a string or a list of parts (text parts are concatenated). Missing,
/// null, or blank content is an error rather than an empty answer.
pub fn extract_content(data: &Value) -> Result<String, LlmError> {
    if let Some(err) = data.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(LlmError::Api(msg));
    }
    let content = data
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));
    let text = match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    if text.trim().is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(text)
}
