//! Gatechat HTTP API
//!
//! Axum-based relay between the chat client and the agent webhooks.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, Value)`, so the logic is testable without going
//! through the router.
//!
//! Endpoints:
//! - GET  /health: liveness plus the active allow-list
//! - GET  /version: server version info
//! - POST /webhook-proxy: forward chat messages to an allow-listed webhook
//! - POST /code-checker: validate an access code remotely

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use gatechat_core::{GateConfig, WebhookClient};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::checker::{checker_inner, CheckerRequest};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub config: GateConfig,
    pub client: WebhookClient,
}

impl HttpState {
    pub fn new(config: GateConfig) -> gatechat_core::GateResult<Self> {
        let client = WebhookClient::from_timeout_secs(config.http.request_timeout_seconds)?;
        Ok(Self { config, client })
    }
}

/// Open CORS: any origin, the headers browser clients send to edge functions.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/webhook-proxy", post(proxy_handler))
        .route("/code-checker", post(checker_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: GateConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState::new(config)?);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Gatechat relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Passed through untouched; the relay does not care about their shape.
    pub messages: Option<Vec<Value>>,
    pub message: Option<String>,
    pub webhook_url: Option<String>,
    pub test_mode: Option<bool>,
}

fn error_body(msg: impl Into<String>) -> Value {
    json!({ "error": msg.into() })
}

/// Decode a JSON request body whatever its declared content type.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, (StatusCode, Value)> {
    serde_json::from_slice(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, error_body(format!("Invalid JSON body: {}", e))))
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn health_inner(config: &GateConfig) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "allowed_prefixes": config.proxy.allowed_prefixes,
            "agents": config.agents.len(),
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "gatechat/1",
    })
}

/// Inner proxy: validates, enforces the allow-list, forwards, wraps as `{data}`.
pub async fn proxy_inner(state: &HttpState, req: ProxyRequest) -> (StatusCode, Value) {
    let payload = match (req.messages, req.message) {
        (Some(messages), _) if !messages.is_empty() => json!({ "messages": messages }),
        (_, Some(message)) if !message.trim().is_empty() => json!({ "message": message }),
        _ => return (StatusCode::BAD_REQUEST, error_body("Missing messages or webhookUrl")),
    };
    let webhook_url = match req.webhook_url {
        Some(u) if !u.trim().is_empty() => u,
        _ => return (StatusCode::BAD_REQUEST, error_body("Missing messages or webhookUrl")),
    };

    if !state.config.proxy.is_allowed(&webhook_url) {
        tracing::warn!(url = %webhook_url, "Rejected webhook outside the allow-list");
        return (StatusCode::FORBIDDEN, error_body("Webhook URL not allowed"));
    }

    tracing::info!(
        url = %webhook_url,
        test_mode = req.test_mode.unwrap_or(false),
        "Forwarding to agent webhook"
    );

    match state.client.post_json(&webhook_url, &payload).await {
        Ok((status, data)) => {
            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "Agent webhook returned non-success");
            }
            (StatusCode::OK, json!({ "data": data }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy error");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.config);
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn proxy_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = match parse_body::<ProxyRequest>(&body) {
        Ok(req) => proxy_inner(&state, req).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn checker_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = match parse_body::<CheckerRequest>(&body) {
        Ok(req) => checker_inner(&state.client, &state.config.code_checker, req).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
