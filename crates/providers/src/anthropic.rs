//! Anthropic Messages API.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//!
//! Usage comes from `usage.input_tokens` / `usage.output_tokens`; the event
//! is attributed to the requested model.

use crate::http::{build_client, read_json, trim_base_url};
use crate::tracked::{Tracked, UsageReport};
use agentcost_core::{ProviderError, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// The `messages.create` capability.
#[async_trait]
pub trait MessagesApi: Send + Sync {
    async fn create_message(&self, request: MessagesRequest)
    -> Result<MessagesResponse, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl MessagesRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: Vec::new(),
            system: None,
            temperature: None,
            stop_sequences: Vec::new(),
        }
    }

    /// Append a user turn.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(InputMessage {
            role: MessageRole::User,
            content: content.into(),
        });
        self
    }

    /// Append an assistant turn.
    pub fn assistant(mut self, content: impl Into<String>) -> Self {
        self.messages.push(InputMessage {
            role: MessageRole::Assistant,
            content: content.into(),
        });
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response body of `POST /v1/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub role: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    pub usage: MessagesUsage,
}

impl MessagesResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl UsageReport for MessagesResponse {
    fn input_tokens(&self) -> u64 {
        self.usage.input_tokens
    }

    fn output_tokens(&self) -> u64 {
        self.usage.output_tokens
    }

    fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("stopReason".into(), self.stop_reason.clone().into());
        metadata.insert("stopSequence".into(), self.stop_sequence.clone().into());
        metadata
    }
}

/// HTTP client for Anthropic's native Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client()?,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MessagesApi for AnthropicClient {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(provider = "anthropic", model = %request.model, "Sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        read_json(response, "Anthropic").await
    }
}

#[async_trait]
impl<C: MessagesApi> MessagesApi for Tracked<C> {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, ProviderError> {
        let model = request.model.clone();
        self.observe(
            ProviderKind::Anthropic,
            &model,
            self.inner().create_message(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcost_core::{EventSink, UsageRecord};
    use agentcost_telemetry::PricingTable;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    fn canned(model: &str) -> Value {
        serde_json::json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Hi"},
                {"type": "thinking", "thinking": "hmm"}
            ],
            "model": model,
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 100, "output_tokens": 200}
        })
    }

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn constructor_with_base_url() {
        let client = AnthropicClient::new("sk-ant-test")
            .unwrap()
            .with_base_url("https://custom.proxy.com/");
        assert_eq!(client.base_url(), "https://custom.proxy.com");
    }

    #[test]
    fn request_serialization_skips_unset_fields() {
        let request = MessagesRequest::new("claude-3-haiku", 64).user("Hello");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("system").is_none());
        assert!(json.get("stop_sequences").is_none());
    }

    #[test]
    fn unknown_content_blocks_are_tolerated() {
        let response: MessagesResponse = serde_json::from_value(canned("claude-3-haiku")).unwrap();
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.content[1], ContentBlock::Other);
        assert_eq!(response.text(), "Hi");
    }

    #[tokio::test]
    async fn sends_auth_headers_and_decodes_response() {
        let seen = Arc::new(Mutex::new(None::<(String, String, Value)>));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v1/messages",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    let header = |name: &str| {
                        headers
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string()
                    };
                    *recorder.lock().unwrap() =
                        Some((header("x-api-key"), header("anthropic-version"), body));
                    Json(canned("claude-sonnet-4-20250514"))
                }
            }),
        );
        let base = spawn_server(app).await;

        let client = AnthropicClient::new("sk-ant-test").unwrap().with_base_url(base);
        let response = client
            .create_message(MessagesRequest::new("claude-sonnet-4-20250514", 128).user("Hello"))
            .await
            .unwrap();

        assert_eq!(response.usage.output_tokens, 200);
        let (key, version, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(key, "sk-ant-test");
        assert_eq!(version, ANTHROPIC_VERSION);
        assert_eq!(body["max_tokens"], 128);
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let app = Router::new()
            .route("/limited/v1/messages", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .route("/denied/v1/messages", post(|| async { StatusCode::UNAUTHORIZED }))
            .route(
                "/broken/v1/messages",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "overloaded") }),
            );
        let base = spawn_server(app).await;
        let request = MessagesRequest::new("claude-3-haiku", 16).user("Hi");

        let call = |path: &str| {
            let client = AnthropicClient::new("k")
                .unwrap()
                .with_base_url(format!("{base}/{path}"));
            let request = request.clone();
            async move { client.create_message(request).await.unwrap_err() }
        };

        assert_eq!(
            call("limited").await,
            ProviderError::RateLimited { retry_after_secs: 5 }
        );
        assert!(matches!(
            call("denied").await,
            ProviderError::AuthenticationFailed(_)
        ));
        assert_eq!(
            call("broken").await,
            ProviderError::ApiError {
                status_code: 500,
                message: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn tracked_client_reports_usage_and_passes_response_through() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { Json(canned("claude-sonnet-4-20250514")) }),
        );
        let base = spawn_server(app).await;
        let records = Arc::new(Mutex::new(Vec::<UsageRecord>::new()));
        let target = records.clone();
        let sink = EventSink::new(move |r| target.lock().unwrap().push(r));

        let raw = AnthropicClient::new("k").unwrap().with_base_url(base);
        let tracked = Tracked::new(raw.clone(), sink, Arc::new(PricingTable::with_defaults()));
        let request = MessagesRequest::new("claude-sonnet-4-20250514", 64).user("Hi");

        let via_tracked = tracked.create_message(request.clone()).await.unwrap();
        let direct = raw.create_message(request).await.unwrap();
        assert_eq!(via_tracked, direct);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.provider, ProviderKind::Anthropic);
        assert_eq!((r.input_tokens, r.output_tokens), (100, 200));
        // 100 * 3 / 1M + 200 * 15 / 1M
        assert!((r.cost - 0.0033).abs() < 1e-9);
        assert_eq!(r.metadata["stopReason"], "end_turn");
        assert_eq!(r.metadata["stopSequence"], Value::Null);
    }
}
