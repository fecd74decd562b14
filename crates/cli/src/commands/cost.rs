//! `agentcost cost` — Price a single call.

use agentcost_core::ProviderKind;
use agentcost_telemetry::PricingTable;

pub async fn run(
    table: &PricingTable,
    provider: ProviderKind,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let breakdown = table
        .resolve(provider, model, input_tokens, output_tokens)
        .map_err(|e| {
            format!("{e}\n  Use `agentcost pricing --provider {provider}` to see known models.")
        })?;

    println!("💵 Cost for {provider}/{model}");
    if breakdown.family_fallback {
        println!("   ⚠ No exact price; using {} rates", breakdown.matched_model);
    }
    println!("   Input tokens:  {input_tokens:>10}  ${:.6}", breakdown.input_cost);
    println!("   Output tokens: {output_tokens:>10}  ${:.6}", breakdown.output_cost);
    println!("   Total:                     ${:.6}", breakdown.total);

    Ok(())
}
