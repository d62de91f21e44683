//! Integration tests: serve the gateway on a free port and drive it over HTTP.
//! The completion API, attachment CDN, and Send API are replaced by in-process fakes.
//! Server tasks are left running when a test ends.

use async_trait::async_trait;
use lib::channels::{ChannelHandle, FetchError, FetchedImage, ImageFetcher};
use lib::config::Config;
use lib::dedup::{DuplicateCache, MemoryStore};
use lib::delivery::OutboundSender;
use lib::dispatch::{Dispatcher, NO_VALID_LINK};
use lib::gateway::{self, GatewayState};
use lib::llm::{InferenceClient, LlmBackend, LlmError, ModelInvocation};
use lib::solve::{Solver, SolverModels};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

struct FixedBackend(&'static str);

#[async_trait]
impl LlmBackend for FixedBackend {
    async fn complete(&self, _invocation: &ModelInvocation) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelHandle for RecordingChannel {
    fn id(&self) -> &str {
        "recording"
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct UnreachableFetcher;

#[async_trait]
impl ImageFetcher for UnreachableFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, FetchError> {
        Err(FetchError::Status(404))
    }
}

/// Serve a gateway wired to fakes; returns its base URL and the recording channel.
async fn spawn_gateway(verify_token: &str) -> (String, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::default());
    let solver = Solver::new(
        InferenceClient::new(Arc::new(FixedBackend("Final answer: 4")), "gpt-4o-mini"),
        SolverModels {
            vision: "gpt-4o".to_string(),
            text: "gpt-4o".to_string(),
        },
    );
    let dispatcher = Dispatcher::new(
        DuplicateCache::new(Arc::new(MemoryStore::new()), 200),
        solver,
        Arc::new(UnreachableFetcher),
        OutboundSender::unpaced(channel.clone()),
    );
    let port = free_port();
    let state = GatewayState {
        dispatcher: Arc::new(dispatcher),
        verify_token: verify_token.into(),
        port,
    };
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind gateway");
    tokio::spawn(async move {
        let _ = axum::serve(listener, gateway::router(state)).await;
    });
    (format!("http://127.0.0.1:{}", port), channel)
}

fn text_delivery(mid: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "page",
        "entry": [{
            "messaging": [{
                "sender": {"id": "U1"},
                "message": {"mid": mid, "text": text}
            }]
        }]
    })
}

#[tokio::test]
async fn handshake_echoes_challenge_for_matching_token() {
    let (base, _) = spawn_gateway("s3cret").await;
    let resp = reqwest::Client::new()
        .get(format!("{}/webhook", base))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "s3cret"),
            ("hub.challenge", "CH123"),
        ])
        .send()
        .await
        .expect("send handshake");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "CH123");
}

#[tokio::test]
async fn handshake_rejects_wrong_token_with_empty_body() {
    let (base, _) = spawn_gateway("s3cret").await;
    let resp = reqwest::Client::new()
        .get(format!("{}/webhook", base))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "wrong"),
            ("hub.challenge", "CH123"),
        ])
        .send()
        .await
        .expect("send handshake");
    assert_eq!(resp.status(), 403);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_delivery_is_acknowledged_without_reply() {
    let (base, channel) = spawn_gateway("test").await;
    let resp = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .body("not json")
        .send()
        .await
        .expect("post delivery");
    assert_eq!(resp.status(), 200);
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn redelivered_message_is_answered_once() {
    let (base, channel) = spawn_gateway("test").await;
    let client = reqwest::Client::new();
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/webhook", base))
            .json(&text_delivery("m-1", "2+2?"))
            .send()
            .await
            .expect("post delivery");
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(
        channel.sent(),
        vec![("U1".to_string(), "Final answer: 4".to_string())]
    );
}

#[tokio::test]
async fn unreachable_image_gets_no_valid_link_reply() {
    let (base, channel) = spawn_gateway("test").await;
    let body = serde_json::json!({
        "object": "page",
        "entry": [{
            "messaging": [{
                "sender": {"id": "U9"},
                "message": {
                    "mid": "m-img",
                    "attachments": [{"type": "image", "payload": {"url": "https://cdn.invalid/x.jpg"}}]
                }
            }]
        }]
    });
    let resp = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .json(&body)
        .send()
        .await
        .expect("post delivery");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        channel.sent(),
        vec![("U9".to_string(), NO_VALID_LINK.to_string())]
    );
}

fn temp_config_dir() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("tutor-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let config_path = dir.join("config.json");
    std::fs::File::create(&config_path)
        .and_then(|mut f| f.write_all(b"{}"))
        .expect("write config.json");
    (dir, config_path)
}

#[tokio::test]
async fn run_gateway_serves_health_json() {
    let port = free_port();
    let (_temp_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();

    let gateway_handle = tokio::spawn(async move {
        let _ = gateway::run_gateway(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    gateway_handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}
