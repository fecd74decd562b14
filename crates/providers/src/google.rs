//! Google Gemini `generateContent`.
//!
//! The API key travels as the `key` query parameter. Model names may be
//! given with or without the `models/` resource prefix; events always carry
//! the bare name.

use crate::http::{build_client, read_json, trim_base_url};
use crate::tracked::{Tracked, UsageReport};
use agentcost_core::{ProviderError, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL_PREFIX: &str = "models/";

/// The `generateContent` capability.
#[async_trait]
pub trait GenerateContentApi: Send + Sync {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError>;
}

/// Strip the `models/` resource prefix, if present.
pub fn model_name(model: &str) -> &str {
    model.strip_prefix(MODEL_PREFIX).unwrap_or(model)
}

/// Non-text parts such as `functionCall` decode with empty text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".into(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A `generateContent` call. The model goes into the URL, not the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            generation_config: None,
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Absent when the candidate was blocked.
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: UsageMetadata,
}

impl GenerateContentResponse {
    /// Text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl UsageReport for GenerateContentResponse {
    fn input_tokens(&self) -> u64 {
        self.usage_metadata.prompt_token_count
    }

    fn output_tokens(&self) -> u64 {
        self.usage_metadata.candidates_token_count
    }

    fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        if let Some(reason) = self.candidates.first().and_then(|c| c.finish_reason.as_ref()) {
            metadata.insert("finishReason".into(), reason.clone().into());
        }
        metadata.insert(
            "totalTokens".into(),
            self.usage_metadata.total_token_count.into(),
        );
        metadata
    }
}

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> Result<reqwest::Url, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            model_name(model)
        );
        reqwest::Url::parse_with_params(&url, &[("key", self.api_key.as_str())])
            .map_err(|e| ProviderError::Network(format!("invalid Gemini URL {url}: {e}")))
    }
}

#[async_trait]
impl GenerateContentApi for GeminiClient {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let url = self.endpoint(&request.model)?;
        debug!(provider = "google", model = %request.model, "Sending generateContent request");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        read_json(response, "Gemini").await
    }
}

#[async_trait]
impl<C: GenerateContentApi> GenerateContentApi for Tracked<C> {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let model = model_name(&request.model).to_string();
        self.observe(
            ProviderKind::Google,
            &model,
            self.inner().generate_content(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcost_core::{EventSink, UsageRecord};
    use agentcost_telemetry::PricingTable;
    use axum::extract::{Path, Query};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn canned() -> Value {
        serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello"}, {"text": " there"}], "role": "model"},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {
                "promptTokenCount": 1_000_000,
                "candidatesTokenCount": 1_000_000,
                "totalTokenCount": 2_000_000
            }
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
    fn strips_models_prefix() {
        assert_eq!(model_name("models/gemini-pro"), "gemini-pro");
        assert_eq!(model_name("gemini-1.5-pro"), "gemini-1.5-pro");
    }

    #[test]
    fn model_stays_out_of_request_body() {
        let request = GenerateContentRequest::new("models/gemini-pro", vec![Content::user("Hi")])
            .with_generation_config(GenerationConfig {
                max_output_tokens: Some(256),
                temperature: None,
            });
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("model").is_none());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hi");
    }

    #[tokio::test]
    async fn posts_to_model_url_with_key() {
        let seen = Arc::new(Mutex::new(Vec::<(String, Option<String>)>::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v1beta/models/{call}",
            post(
                move |Path(call): Path<String>, Query(query): Query<HashMap<String, String>>| {
                    let recorder = recorder.clone();
                    async move {
                        recorder.lock().unwrap().push((call, query.get("key").cloned()));
                        Json(canned())
                    }
                },
            ),
        );
        let base = spawn_server(app).await;

        let client = GeminiClient::new("g-key").unwrap().with_base_url(base);
        let response = client
            .generate_content(GenerateContentRequest::new(
                "models/gemini-pro",
                vec![Content::user("Hi")],
            ))
            .await
            .unwrap();

        assert_eq!(response.text(), "Hello there");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "gemini-pro:generateContent");
        assert_eq!(seen[0].1.as_deref(), Some("g-key"));
    }

    #[test]
    fn decodes_blocked_and_function_call_candidates() {
        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY", "index": 0}],
            "usageMetadata": {"promptTokenCount": 12, "totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(blocked.text(), "");
        assert_eq!(blocked.candidates[0].content, Content::default());
        assert_eq!(blocked.metadata()["finishReason"], "SAFETY");

        let call: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "lookup", "args": {"q": "x"}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 5, "totalTokenCount": 25}
        }))
        .unwrap();
        assert_eq!(call.candidates[0].content.parts.len(), 1);
        assert_eq!(call.output_tokens(), 5);
    }

    #[tokio::test]
    async fn tracked_client_keeps_usage_of_blocked_response() {
        let app = Router::new().route(
            "/v1beta/models/{call}",
            post(|| async {
                Json(serde_json::json!({
                    "candidates": [{"finishReason": "SAFETY", "index": 0}],
                    "usageMetadata": {"promptTokenCount": 1_000_000, "totalTokenCount": 1_000_000}
                }))
            }),
        );
        let base = spawn_server(app).await;
        let records = Arc::new(Mutex::new(Vec::<UsageRecord>::new()));
        let target = records.clone();
        let tracked = Tracked::new(
            GeminiClient::new("k").unwrap().with_base_url(base),
            EventSink::new(move |r| target.lock().unwrap().push(r)),
            Arc::new(PricingTable::with_defaults()),
        );

        let response = tracked
            .generate_content(GenerateContentRequest::new(
                "gemini-pro",
                vec![Content::user("Hi")],
            ))
            .await
            .unwrap();
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("SAFETY"));

        let records = records.lock().unwrap();
        let r = &records[0];
        assert!(r.error().is_none());
        assert_eq!((r.input_tokens, r.output_tokens), (1_000_000, 0));
        assert!((r.cost - 0.125).abs() < 1e-9);
    }

    #[tokio::test]
    async fn tracked_client_records_bare_model_name() {
        let app = Router::new().route("/v1beta/models/{call}", post(|| async { Json(canned()) }));
        let base = spawn_server(app).await;
        let records = Arc::new(Mutex::new(Vec::<UsageRecord>::new()));
        let target = records.clone();
        let tracked = Tracked::new(
            GeminiClient::new("k").unwrap().with_base_url(base),
            EventSink::new(move |r| target.lock().unwrap().push(r)),
            Arc::new(PricingTable::with_defaults()),
        );

        tracked
            .generate_content(GenerateContentRequest::new(
                "models/gemini-pro",
                vec![Content::user("Hi")],
            ))
            .await
            .unwrap();

        let records = records.lock().unwrap();
        let r = &records[0];
        assert_eq!(r.model, "gemini-pro");
        assert!((r.cost - 0.5).abs() < 1e-9);
        assert_eq!(r.metadata["finishReason"], "STOP");
        assert_eq!(r.metadata["totalTokens"], 2_000_000);
    }
}
