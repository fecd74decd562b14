pub mod config_cmd;
pub mod cost;
pub mod demo;
pub mod pricing;

use agentcost_config::TrackerConfig;
use agentcost_telemetry::PricingTable;

/// Built-in rates merged with any `custom_pricing` from the config file.
pub fn pricing_table() -> Result<PricingTable, Box<dyn std::error::Error>> {
    let config = TrackerConfig::load_unvalidated()
        .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(PricingTable::with_defaults().with_overrides(&config.custom_pricing))
}
