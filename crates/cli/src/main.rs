//! AgentCost CLI — the main entry point.
//!
//! Commands:
//! - `pricing` — Show the built-in pricing table
//! - `cost`    — Price a single call
//! - `demo`    — Run the mock clients through a tracker
//! - `config`  — Inspect or create the configuration file

use agentcost_core::ProviderKind;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentcost",
    about = "AgentCost — LLM cost tracking",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show model pricing (USD per 1M tokens)
    Pricing {
        /// Only show one provider
        #[arg(short, long)]
        provider: Option<ProviderKind>,
    },

    /// Compute the cost of a single call
    Cost {
        #[arg(short, long)]
        provider: ProviderKind,

        #[arg(short, long)]
        model: String,

        /// Input (prompt) tokens
        #[arg(short, long)]
        input: u64,

        /// Output (completion) tokens
        #[arg(short, long)]
        output: u64,
    },

    /// Send mock provider calls through a tracker and flush them
    Demo {
        /// Calls per provider
        #[arg(short, long, default_value_t = 1)]
        calls: u32,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Check the configuration for errors
    Validate,
    /// Print the config file path
    Path,
    /// Write a starter config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Pricing { provider } => {
            commands::pricing::run(&commands::pricing_table()?, provider).await?
        }
        Commands::Cost {
            provider,
            model,
            input,
            output,
        } => {
            commands::cost::run(&commands::pricing_table()?, provider, &model, input, output)
                .await?
        }
        Commands::Demo { calls } => commands::demo::run(calls, cli.verbose).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
