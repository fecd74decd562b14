//! Provider clients and cost-tracking decorators for AgentCost.
//!
//! Each provider family is a capability trait ([`MessagesApi`],
//! [`ChatCompletionsApi`], [`GenerateContentApi`]) with a real HTTP client
//! and a mock. [`Tracked<C>`] implements the same trait as the client it
//! wraps and reports every call to a tracker; [`TrackerExt`] adds the
//! factory methods to [`agentcost_telemetry::Tracker`].

pub mod anthropic;
pub mod factory;
pub mod google;
mod http;
pub mod mock;
pub mod openai;
pub mod tracked;

pub use anthropic::{AnthropicClient, MessagesApi, MessagesRequest, MessagesResponse};
pub use factory::{TrackedClient, TrackerExt};
pub use google::{GeminiClient, GenerateContentApi, GenerateContentRequest, GenerateContentResponse};
pub use mock::{MockAnthropicClient, MockGeminiClient, MockOpenAiClient};
pub use openai::{ChatCompletion, ChatCompletionRequest, ChatCompletionsApi, ChatMessage, OpenAiClient};
pub use tracked::{Tracked, UsageReport};
