//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tutor/config.json`) and environment.
//! Secrets (page access token, verify token, inference key) are usually supplied
//! through the environment and override whatever the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Verify token used for the webhook handshake when none is configured.
pub const DEFAULT_VERIFY_TOKEN: &str = "test";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messaging platform (Messenger send API and webhook handshake).
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// Completion service and model selection.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Duplicate message suppression.
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook HTTP server (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). Put a TLS-terminating proxy in front for the platform.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Messenger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessengerConfig {
    /// Page access token for the send API. Overridden by PAGE_ACCESS_TOKEN env.
    pub page_access_token: Option<String>,
    /// Secret echoed back during the webhook handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Graph API base including version (default "https://graph.facebook.com/v19.0").
    #[serde(default = "default_messenger_api_base")]
    pub api_base: String,
    /// Pause between consecutive chunks of one reply, in milliseconds.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    /// Maximum characters per outbound message.
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,
    /// Per-call timeout for the send API.
    #[serde(default = "default_messenger_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_messenger_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_send_delay_ms() -> u64 {
    250
}

fn default_chunk_limit() -> usize {
    1800
}

fn default_messenger_timeout_secs() -> u64 {
    30
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            page_access_token: None,
            verify_token: None,
            api_base: default_messenger_api_base(),
            send_delay_ms: default_send_delay_ms(),
            chunk_limit: default_chunk_limit(),
            timeout_secs: default_messenger_timeout_secs(),
        }
    }
}

impl MessengerConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

/// Completion service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    /// API key. Overridden by OPENAI_KEY env.
    pub api_key: Option<String>,
    /// Base URL up to and including the version segment (default "https://api.openai.com/v1").
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,
    /// Vision-capable model used for extraction and direct image solving.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// Text/reasoning model used to solve extracted or typed problems.
    #[serde(default = "default_text_model")]
    pub text_model: String,
    /// Model retried once when a call against any other model fails.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    /// Per-call timeout for completion requests.
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
    /// Extractions shorter than this many characters are treated as unreadable.
    #[serde(default = "default_min_extract_chars")]
    pub min_extract_chars: usize,
}

fn default_inference_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_text_model() -> String {
    "gpt-4o".to_string()
}

fn default_fallback_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_inference_timeout_secs() -> u64 {
    120
}

fn default_min_extract_chars() -> usize {
    12
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_inference_base_url(),
            vision_model: default_vision_model(),
            text_model: default_text_model(),
            fallback_model: default_fallback_model(),
            timeout_secs: default_inference_timeout_secs(),
            min_extract_chars: default_min_extract_chars(),
        }
    }
}

/// Duplicate cache location and bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupConfig {
    /// Cache file. Relative paths are resolved against the config file's parent. Default: `mids_cache.json` next to the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Number of most recently inserted message ids to remember.
    #[serde(default = "default_dedup_limit")]
    pub limit: usize,
}

fn default_dedup_limit() -> usize {
    200
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            path: None,
            limit: default_dedup_limit(),
        }
    }
}

/// Read an env var, treating blank values as unset.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the page access token: env PAGE_ACCESS_TOKEN overrides config.
pub fn resolve_page_access_token(config: &Config) -> Option<String> {
    env_non_empty("PAGE_ACCESS_TOKEN")
        .or_else(|| config_non_empty(config.messenger.page_access_token.as_ref()))
}

/// Resolve the handshake verify token: env VERIFY_TOKEN, then config, then [`DEFAULT_VERIFY_TOKEN`].
pub fn resolve_verify_token(config: &Config) -> String {
    env_non_empty("VERIFY_TOKEN")
        .or_else(|| config_non_empty(config.messenger.verify_token.as_ref()))
        .unwrap_or_else(|| DEFAULT_VERIFY_TOKEN.to_string())
}

/// Resolve the inference API key: env OPENAI_KEY overrides config.
pub fn resolve_inference_key(config: &Config) -> Option<String> {
    env_non_empty("OPENAI_KEY").or_else(|| config_non_empty(config.inference.api_key.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TUTOR_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".tutor").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Directory containing the config file (`.` when the path has no parent).
fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the dedup cache file: `dedup.path` if set (relative paths resolved against the config file's parent), otherwise `mids_cache.json` beside the config file.
pub fn resolve_dedup_path(config: &Config, config_path: &Path) -> PathBuf {
    let dir = config_dir(config_path);
    match &config.dedup.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                dir.join(p)
            }
        }
        _ => dir.join("mids_cache.json"),
    }
}

/// Load config from the given path (or TUTOR_CONFIG_PATH / default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the dedup cache file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
