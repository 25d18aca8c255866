//! HTTP plumbing shared by the proxy server and the chat client.
//!
//! - [`WebhookClient`] POSTs JSON and reads the body as JSON or text
//!   depending on the response content type.
//! - [`AgentTransport`] is the seam the chat state uses to deliver a
//!   [`Dispatch`]; [`ProxyTransport`] implements it against the proxy relay.
//! - [`CodeCheckerClient`] calls the code-checker relay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::{GateError, GateResult};
use crate::models::{ChatTurn, CodeVerdict};
use crate::pipeline::Dispatch;

// ============================================================================
// WebhookClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    /// `timeout` of `None` keeps reqwest's default (no overall timeout).
    pub fn new(timeout: Option<Duration>) -> GateResult<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_timeout_secs(secs: u64) -> GateResult<Self> {
        Self::new((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// POST `body` as JSON. Returns the upstream status and its body; a body
    /// that is not declared as JSON comes back as a JSON string.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> GateResult<(StatusCode, Value)> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let data = read_body(response).await?;
        Ok((status, data))
    }

    pub async fn get_json(&self, url: &str) -> GateResult<(StatusCode, Value)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let data = read_body(response).await?;
        Ok((status, data))
    }
}

/// Read a response body as JSON when the content type says so, else as text.
pub async fn read_body(response: reqwest::Response) -> GateResult<Value> {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    if is_json {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        Ok(Value::String(response.text().await?))
    }
}

/// Pull `data` out of a relay response, or turn `{error}` into an error.
fn unwrap_relay_body(status: StatusCode, body: Value) -> GateResult<Value> {
    if let Some(message) = body.get("error").and_then(|e| e.as_str()) {
        return Err(GateError::Relay {
            status: status.as_u16(),
            message: message.to_string(),
        });
    }
    if !status.is_success() {
        return Err(GateError::Relay {
            status: status.as_u16(),
            message: body.to_string(),
        });
    }
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Err(GateError::Relay {
            status: status.as_u16(),
            message: format!("response has no data field: {}", other),
        }),
    }
}

// ============================================================================
// AgentTransport
// ============================================================================

/// Delivers a dispatch to its agent and returns the raw reply payload.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn deliver(&self, dispatch: &Dispatch) -> GateResult<Value>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyPayload<'a> {
    messages: &'a [ChatTurn],
    webhook_url: &'a str,
    test_mode: bool,
}

/// Sends dispatches through the proxy relay's `/webhook-proxy` endpoint.
#[derive(Debug, Clone)]
pub struct ProxyTransport {
    client: WebhookClient,
    endpoint: String,
}

impl ProxyTransport {
    pub fn new(client: WebhookClient, server_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/webhook-proxy", server_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AgentTransport for ProxyTransport {
    async fn deliver(&self, dispatch: &Dispatch) -> GateResult<Value> {
        let payload = ProxyPayload {
            messages: &dispatch.messages,
            webhook_url: &dispatch.webhook_url,
            test_mode: dispatch.test_mode,
        };
        let (status, body) = self.client.post_json(&self.endpoint, &payload).await?;
        unwrap_relay_body(status, body)
    }

    fn name(&self) -> &str {
        "proxy"
    }
}

// ============================================================================
// CodeCheckerClient
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CodeCheckPayload<'a> {
    code: &'a str,
    test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct CodeCheckerClient {
    client: WebhookClient,
    endpoint: String,
}

impl CodeCheckerClient {
    pub fn new(client: WebhookClient, server_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/code-checker", server_url.trim_end_matches('/')),
        }
    }

    pub async fn check(&self, code: &str, test_mode: bool) -> GateResult<CodeVerdict> {
        let payload = CodeCheckPayload { code, test_mode };
        let (status, body) = self.client.post_json(&self.endpoint, &payload).await?;
        if let Some(message) = body.get("error").and_then(|e| e.as_str()) {
            return Err(GateError::Relay {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }
        Ok(serde_json::from_value(body)?)
    }
}
