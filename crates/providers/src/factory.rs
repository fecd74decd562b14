//! Tracker factory methods for tracked clients.

use crate::anthropic::AnthropicClient;
use crate::google::GeminiClient;
use crate::openai::OpenAiClient;
use crate::tracked::Tracked;
use agentcost_core::{ProviderError, ProviderKind};
use agentcost_telemetry::Tracker;

/// A tracked HTTP client for any supported provider family.
#[derive(Debug)]
pub enum TrackedClient {
    Anthropic(Tracked<AnthropicClient>),
    OpenAi(Tracked<OpenAiClient>),
    Google(Tracked<GeminiClient>),
}

impl TrackedClient {
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Anthropic(_) => ProviderKind::Anthropic,
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Google(_) => ProviderKind::Google,
        }
    }
}

/// Wrapping clients so that their calls report to a [`Tracker`].
///
/// Every wrapped client gets its own decorator; they share only the
/// tracker's sink and pricing table.
pub trait TrackerExt {
    /// Wrap any client implementing a capability trait.
    fn track_client<C>(&self, client: C) -> Tracked<C>;

    fn anthropic(&self, api_key: impl Into<String>) -> Result<Tracked<AnthropicClient>, ProviderError> {
        Ok(self.track_client(AnthropicClient::new(api_key)?))
    }

    fn openai(&self, api_key: impl Into<String>) -> Result<Tracked<OpenAiClient>, ProviderError> {
        Ok(self.track_client(OpenAiClient::new(api_key)?))
    }

    fn google(&self, api_key: impl Into<String>) -> Result<Tracked<GeminiClient>, ProviderError> {
        Ok(self.track_client(GeminiClient::new(api_key)?))
    }

    /// Build the HTTP client for `provider` and wrap it.
    fn wrap(
        &self,
        provider: ProviderKind,
        api_key: impl Into<String>,
    ) -> Result<TrackedClient, ProviderError> {
        Ok(match provider {
            ProviderKind::Anthropic => TrackedClient::Anthropic(self.anthropic(api_key)?),
            ProviderKind::OpenAi => TrackedClient::OpenAi(self.openai(api_key)?),
            ProviderKind::Google => TrackedClient::Google(self.google(api_key)?),
        })
    }
}

impl TrackerExt for Tracker {
    fn track_client<C>(&self, client: C) -> Tracked<C> {
        Tracked::new(client, self.sink(), self.pricing()).with_debug(self.debug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic::{MessagesApi, MessagesRequest};
    use crate::google::{Content, GenerateContentApi, GenerateContentRequest};
    use crate::mock::{MockAnthropicClient, MockGeminiClient};
    use agentcost_config::TrackerConfig;
    use agentcost_telemetry::{DeliveryError, FlushOutcome, Transport};
    use agentcost_core::CostEvent;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Collected(Mutex<Vec<CostEvent>>);

    #[async_trait]
    impl Transport for Collected {
        async fn deliver(&self, events: &[CostEvent]) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().extend_from_slice(events);
            Ok(())
        }
    }

    fn tracker(collected: Arc<Collected>) -> Tracker {
        let config = TrackerConfig::new("proj_factory", "ac_key")
            .with_flush_interval(Duration::from_secs(60));
        Tracker::with_transport(config, collected).unwrap()
    }

    #[tokio::test]
    async fn wrap_picks_the_provider_client() {
        let tracker = tracker(Arc::default());
        for provider in ProviderKind::ALL {
            let client = tracker.wrap(provider, "key").unwrap();
            assert_eq!(client.provider(), provider);
        }
    }

    #[tokio::test]
    async fn wrapped_clients_share_the_tracker_queue() {
        let collected = Arc::new(Collected::default());
        let tracker = tracker(collected.clone());
        let claude = tracker.track_client(MockAnthropicClient::new().with_delay(Duration::ZERO));
        let gemini = tracker.track_client(MockGeminiClient::new().with_delay(Duration::ZERO));

        claude
            .create_message(MessagesRequest::new("claude-sonnet-4-20250514", 100).user("Hi"))
            .await
            .unwrap();
        gemini
            .generate_content(GenerateContentRequest::new("gemini-pro", vec![Content::user("Hi")]))
            .await
            .unwrap();
        assert_eq!(tracker.pending(), 2);

        assert_eq!(tracker.flush().await, FlushOutcome::Delivered(2));
        let events = collected.0.lock().unwrap();
        assert!(events.iter().all(|e| e.project_id == "proj_factory"));
        assert_eq!(events[0].provider, ProviderKind::Anthropic);
        assert_eq!(events[1].provider, ProviderKind::Google);
        assert_eq!(events[1].total_tokens(), 23);
    }
}
