//! `agentcost pricing` — List model pricing, including configured overrides.

use agentcost_core::ProviderKind;
use agentcost_telemetry::PricingTable;

pub async fn run(
    table: &PricingTable,
    provider: Option<ProviderKind>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = render(table, provider);

    println!("💰 Model Pricing (per 1M tokens)");
    println!("─────────────────────────────────────────────────────────────");
    println!("{:<10} {:<32} {:>8} {:>9}", "Provider", "Model", "Input", "Output");
    for row in &rows {
        println!("{row}");
    }
    println!();
    println!("  {} models with pricing data", rows.len());

    Ok(())
}

fn render(table: &PricingTable, provider: Option<ProviderKind>) -> Vec<String> {
    table
        .entries()
        .filter(|(p, _, _)| provider.is_none_or(|wanted| wanted == *p))
        .map(|(p, model, rates)| {
            format!(
                "{:<10} {:<32} ${:>7.3} ${:>8.3}",
                p.as_str(),
                model,
                rates.input_per_m,
                rates.output_per_m
            )
        })
        .collect()
}
