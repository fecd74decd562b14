//! `agentcost demo` — Drive the mock provider clients through a tracker.

use agentcost_config::TrackerConfig;
use agentcost_core::{ProviderError, ProviderKind};
use agentcost_providers::google::Content;
use agentcost_providers::mock::MOCK_DELAY;
use agentcost_providers::{
    ChatCompletionRequest, ChatCompletionsApi, ChatMessage, GenerateContentApi,
    GenerateContentRequest, MessagesApi, MessagesRequest, MockAnthropicClient, MockGeminiClient,
    MockOpenAiClient, TrackerExt,
};
use agentcost_telemetry::{FlushOutcome, Tracker};
use std::time::Duration;

pub async fn run(calls: u32, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TrackerConfig::load().map_err(|e| {
        format!(
            "Failed to load config: {e}\n  Run `agentcost config init` or set AGENTCOST_PROJECT_ID and AGENTCOST_API_KEY."
        )
    })?;
    config.debug |= verbose;

    println!("🧪 AgentCost demo");
    println!("   Project:  {}", config.project_id);
    println!("   Endpoint: {}", config.endpoint);
    println!();

    let tracker = Tracker::new(config)?;
    let total = exercise(&tracker, calls, MOCK_DELAY).await?;

    println!("   Calls tracked: {}", calls * 3);
    println!("   Total cost:    ${total:.6}");
    println!("   Queued:        {}", tracker.pending());

    match tracker.shutdown().await {
        FlushOutcome::Delivered(n) => println!("   ✅ Delivered {n} events"),
        FlushOutcome::Requeued(n) => println!("   ⚠️  Collector unreachable, {n} events not delivered"),
        FlushOutcome::Skipped => println!("   Nothing left to deliver"),
    }

    Ok(())
}

/// Make `calls` requests against each mock client; returns the summed cost.
pub async fn exercise(
    tracker: &Tracker,
    calls: u32,
    delay: Duration,
) -> Result<f64, ProviderError> {
    let claude = tracker.track_client(MockAnthropicClient::new().with_delay(delay));
    let gpt = tracker.track_client(MockOpenAiClient::new().with_delay(delay));
    let gemini = tracker.track_client(MockGeminiClient::new().with_delay(delay));
    let pricing = tracker.pricing();

    let mut total = 0.0;
    for i in 1..=calls {
        let prompt = format!("Hello #{i}");

        let message = claude
            .create_message(MessagesRequest::new("claude-sonnet-4-20250514", 100).user(&prompt))
            .await?;
        total += pricing
            .resolve_cost(
                ProviderKind::Anthropic,
                "claude-sonnet-4-20250514",
                message.usage.input_tokens,
                message.usage.output_tokens,
            )
            .unwrap_or_default();

        let completion = gpt
            .create_chat_completion(ChatCompletionRequest::new(
                "gpt-4-turbo",
                vec![ChatMessage::user(&prompt)],
            ))
            .await?;
        total += pricing
            .resolve_cost(
                ProviderKind::OpenAi,
                &completion.model,
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
            )
            .unwrap_or_default();

        let generated = gemini
            .generate_content(GenerateContentRequest::new(
                "models/gemini-pro",
                vec![Content::user(&prompt)],
            ))
            .await?;
        total += pricing
            .resolve_cost(
                ProviderKind::Google,
                "gemini-pro",
                generated.usage_metadata.prompt_token_count,
                generated.usage_metadata.candidates_token_count,
            )
            .unwrap_or_default();
    }

    Ok(total)
}
