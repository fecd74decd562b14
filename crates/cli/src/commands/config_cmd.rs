//! `agentcost config` — Configuration management commands.

use agentcost_config::TrackerConfig;
use std::path::PathBuf;

fn config_path() -> PathBuf {
    TrackerConfig::config_dir().join("config.toml")
}

/// Render a config as TOML with the API key masked.
fn redacted_toml(config: &TrackerConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if !shown.api_key.is_empty() {
        shown.api_key = "[REDACTED]".into();
    }
    toml::to_string_pretty(&shown)
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = TrackerConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match TrackerConfig::load() {
        Ok(config) => {
            println!("   ✅ Config is valid");
            println!();
            println!("   Project:   {}", config.project_id);
            println!("   Endpoint:  {}", config.endpoint);
            println!("   Batch:     {} events", config.batch_size);
            println!("   Interval:  {} ms", config.flush_interval_ms);
            println!("   Retries:   {} attempts", config.retry.max_attempts);
            let overrides: usize = config.custom_pricing.values().map(|m| m.len()).sum();
            if overrides > 0 {
                println!("   Custom pricing: {overrides} models");
            }
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() {
        println!("  Config already exists: {}", path.display());
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, TrackerConfig::default_toml())?;
    println!("✅ Created {}", path.display());
    println!("   Fill in project_id and api_key, or set AGENTCOST_PROJECT_ID / AGENTCOST_API_KEY.");

    Ok(())
}
