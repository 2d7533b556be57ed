//! Toolgate: tool-call mediation CLI.
//!
//! Usage:
//!   toolgate chat "calculate 5 + 3"   Run one turn and print the reply
//!   toolgate tools [--refresh]        List the tools the registry exposes
//!   toolgate init                     Write a default config file
//!   toolgate status                   Show configuration and tool availability

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use tracing::info;

use toolgate::agent::Mediator;
use toolgate::config::{self, MediatorConfig};
use toolgate::types::{ChatResponse, TurnOutcome};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(version = "0.1.0")]
#[command(about = "Tool-call mediation between a text generator and a tool registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.toolgate/toolgate.toml).
    #[arg(long)]
    config: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one chat turn.
    Chat {
        /// The user message.
        message: String,

        /// Print the full JSON response instead of the reply.
        #[arg(long)]
        json: bool,
    },

    /// List discovered tools.
    Tools {
        /// Ignore cached results and run discovery again.
        #[arg(long)]
        refresh: bool,
    },

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and tool availability.
    Status,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(config::resolve_path)
        .unwrap_or_else(config::default_config_path);

    if let Commands::Init { force } = cli.command {
        return cmd_init(&config_path, force);
    }

    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message, json } => cmd_chat(&cfg, message, json).await,
        Commands::Tools { refresh } => cmd_tools(&cfg, refresh).await,
        Commands::Status => cmd_status(&cfg, &config_path).await,
        Commands::Init { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_chat(cfg: &MediatorConfig, message: String, json: bool) -> Result<()> {
    let mediator = Mediator::from_config(cfg)?;

    let (turn, tools_available) = tokio::select! {
        handled = mediator.run_turn(&message) => handled,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{} Interrupted", "<<<".red().bold());
            return Ok(());
        }
    };

    if json {
        let response = ChatResponse::from_turn(&turn, tools_available);
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?
        );
        return Ok(());
    }

    println!("{} {}", ">>>".green().bold(), colorize_reply(&turn.final_reply, turn.outcome));
    info!("Turn {} ended as {}", turn.id, turn.outcome);
    Ok(())
}

async fn cmd_tools(cfg: &MediatorConfig, refresh: bool) -> Result<()> {
    let mediator = Mediator::from_config(cfg)?;
    let tools = if refresh {
        mediator.refresh_tools().await
    } else {
        mediator.connection().discover().await
    };

    if tools.is_empty() {
        println!("{}", "No tools available.".yellow());
        if let Some(failure) = mediator.connection().state().await.failure() {
            println!("{}", failure.to_string().dimmed());
        }
        return Ok(());
    }

    println!();
    println!("{}", "=== Tools ===".bold());
    for tool in tools.iter() {
        println!();
        println!("  {}", tool.signature().bold());
        if !tool.description.is_empty() {
            println!("    {}", tool.description.dimmed());
        }
        for param in &tool.parameters {
            let required = if param.required { "required" } else { "optional" };
            println!(
                "    - {} ({}, {}){}",
                param.name,
                param.param_type,
                required,
                if param.description.is_empty() {
                    String::new()
                } else {
                    format!(": {}", param.description)
                }
            );
        }
    }
    println!();
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }
    config::save_config(&MediatorConfig::default(), config_path)?;
    println!(
        "{} Wrote default config to {}",
        ">>>".green().bold(),
        config_path.display()
    );
    Ok(())
}

async fn cmd_status(cfg: &MediatorConfig, config_path: &Path) -> Result<()> {
    let mediator = Mediator::from_config(cfg)?;
    let health = mediator.health().await;

    println!();
    println!("{}", "=== Toolgate Status ===".bold());
    println!();
    println!("  {}:  {}", "Config".bold(), config_path.display());
    println!();
    println!("  {}:", "Generator".bold());
    println!("    URL:        {}", cfg.generator_url);
    println!("    Model:      {}", cfg.generator_model);
    println!("    Max tokens: {}", cfg.max_tokens);
    println!("    Mode:       {:?}", cfg.mode);
    println!();
    println!("  {}:", "Registry".bold());
    println!("    Kind:       {:?}", cfg.registry);
    println!("    URL:        {}", cfg.registry_url);
    println!(
        "    Tools:      {}",
        if health.tools_available {
            health.tools_count.to_string().green().to_string()
        } else {
            "unavailable".red().to_string()
        }
    );
    println!();
    println!("  {}:", "Limits".bold());
    println!("    Iterations: {}", cfg.max_iterations);
    println!("    Timeout:    {}s", cfg.request_timeout_secs);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn colorize_reply(reply: &str, outcome: TurnOutcome) -> String {
    match outcome {
        TurnOutcome::ToolAnswered | TurnOutcome::DirectReply => reply.green().to_string(),
        TurnOutcome::ShortCircuit => reply.to_string(),
        TurnOutcome::TooShort | TurnOutcome::InvalidCall | TurnOutcome::ToolFailed => {
            reply.yellow().to_string()
        }
        TurnOutcome::GenerationFailed
        | TurnOutcome::MaxIterationsReached
        | TurnOutcome::Timeout => reply.red().to_string(),
    }
}
