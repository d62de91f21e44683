//! Gateway HTTP server.

use crate::config::{self, Config};
use crate::dispatch::{verify_handshake, Dispatcher};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    /// Secret the platform must present during the handshake.
    pub verify_token: Arc<str>,
    /// Port reported by the health probe.
    pub port: u16,
}

/// Router with the webhook and health routes.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(webhook_verify).post(webhook_deliver))
        .with_state(state)
}

/// Run the gateway; binds to config.gateway.bind:config.gateway.port and blocks until shutdown (e.g. Ctrl+C).
/// `config_path` is used to resolve the duplicate cache file.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    if config::resolve_page_access_token(&config).is_none() {
        log::warn!("no page access token (PAGE_ACCESS_TOKEN); replies will fail to send");
    }
    if config::resolve_inference_key(&config).is_none() {
        log::warn!("no inference key (OPENAI_KEY); completion calls will be unauthenticated");
    }
    let dedup_path = config::resolve_dedup_path(&config, &config_path);
    log::info!("duplicate cache at {}", dedup_path.display());

    let state = GatewayState {
        dispatcher: Arc::new(Dispatcher::from_config(&config, &config_path)),
        verify_token: config::resolve_verify_token(&config).into(),
        port: config.gateway.port,
    };

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight deliveries");
}

/// GET /webhook: subscription handshake; echoes hub.challenge or answers 403.
async fn webhook_verify(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match verify_handshake(&params, &state.verify_token) {
        Some(challenge) => {
            log::info!("webhook handshake verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            log::warn!("webhook handshake rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook: processes every event before acknowledging; always 200.
async fn webhook_deliver(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let outcomes = state.dispatcher.handle_body(&body).await;
    log::debug!("webhook delivery handled ({} event(s))", outcomes.len());
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}
