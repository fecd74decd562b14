//! Offline stand-ins for the provider clients.
//!
//! Each mock answers with a canned response after a simulated delay, so the
//! tracking pipeline can be exercised without credentials or network.

use crate::anthropic::{ContentBlock, MessagesApi, MessagesRequest, MessagesResponse, MessagesUsage};
use crate::google::{
    Candidate, Content, GenerateContentApi, GenerateContentRequest, GenerateContentResponse,
    Part, UsageMetadata,
};
use crate::openai::{
    ChatChoice, ChatCompletion, ChatCompletionRequest, ChatCompletionsApi, ChatMessage,
    CompletionUsage,
};
use agentcost_core::ProviderError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Default simulated latency.
pub const MOCK_DELAY: Duration = Duration::from_millis(100);

const MOCK_TEXT: &str = "Hello! How can I assist you today?";

/// Canned Messages API response: 12 input / 25 output tokens.
pub fn anthropic_response() -> MessagesResponse {
    MessagesResponse {
        id: "msg_01XFDUDYJgAACzvnptvVoYEL".into(),
        role: "assistant".into(),
        model: "claude-sonnet-4-20250514".into(),
        content: vec![ContentBlock::Text {
            text: MOCK_TEXT.into(),
        }],
        stop_reason: Some("end_turn".into()),
        stop_sequence: None,
        usage: MessagesUsage {
            input_tokens: 12,
            output_tokens: 25,
        },
    }
}

/// Canned chat completion: `gpt-4-turbo`, 10 prompt / 20 completion tokens.
pub fn openai_response() -> ChatCompletion {
    ChatCompletion {
        id: "chatcmpl-123".into(),
        object: "chat.completion".into(),
        created: 1_677_652_288,
        model: "gpt-4-turbo".into(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::assistant("Hello! How can I help you today?"),
            finish_reason: Some("stop".into()),
        }],
        usage: CompletionUsage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
        },
    }
}

/// Canned Gemini response: 8 prompt / 15 candidate tokens.
pub fn gemini_response() -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Content {
                role: "model".into(),
                parts: vec![Part {
                    text: MOCK_TEXT.into(),
                }],
            },
            finish_reason: Some("STOP".into()),
            index: 0,
        }],
        usage_metadata: UsageMetadata {
            prompt_token_count: 8,
            candidates_token_count: 15,
            total_token_count: 23,
        },
    }
}

macro_rules! mock_client {
    ($(#[$doc:meta])* $name:ident, $response:ty, $canned:path) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            delay: Duration,
            outcome: Result<$response, ProviderError>,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    delay: MOCK_DELAY,
                    outcome: Ok($canned()),
                }
            }

            pub fn with_delay(mut self, delay: Duration) -> Self {
                self.delay = delay;
                self
            }

            /// Answer with this response instead of the canned one.
            pub fn with_response(mut self, response: $response) -> Self {
                self.outcome = Ok(response);
                self
            }

            /// Fail every call with this error.
            pub fn failing(mut self, error: ProviderError) -> Self {
                self.outcome = Err(error);
                self
            }

            async fn respond(&self) -> Result<$response, ProviderError> {
                tokio::time::sleep(self.delay).await;
                self.outcome.clone()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

mock_client!(
    /// Mock Anthropic client.
    MockAnthropicClient,
    MessagesResponse,
    anthropic_response
);
mock_client!(
    /// Mock OpenAI client.
    MockOpenAiClient,
    ChatCompletion,
    openai_response
);
mock_client!(
    /// Mock Gemini client.
    MockGeminiClient,
    GenerateContentResponse,
    gemini_response
);

#[async_trait]
impl MessagesApi for MockAnthropicClient {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, ProviderError> {
        info!(model = %request.model, max_tokens = request.max_tokens, "[Mock] Anthropic API called");
        self.respond().await
    }
}

#[async_trait]
impl ChatCompletionsApi for MockOpenAiClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletion, ProviderError> {
        info!(model = %request.model, max_tokens = ?request.max_tokens, "[Mock] OpenAI API called");
        self.respond().await
    }
}

#[async_trait]
impl GenerateContentApi for MockGeminiClient {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        info!(model = %request.model, "[Mock] Gemini API called");
        self.respond().await
    }
}
