//! policybot CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP chat server
//! - `profile`  — Show the user profile injected into the system prompt
//! - `retrieve` — Show the knowledge context for a question
//! - `doctor`   — Diagnose configuration and service reachability
//! - `init-config` — Print a starter config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "policybot",
    about = "policybot — policy Q&A assistant with RAG and long-term user memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $POLICYBOT_CONFIG or ./policybot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch and print the formatted user profile
    Profile {
        /// Print the raw profile document instead
        #[arg(long)]
        raw: bool,
    },

    /// Print the knowledge context retrieved for a question
    Retrieve {
        /// The question to look up
        query: String,
    },

    /// Diagnose configuration and service reachability
    Doctor,

    /// Print a starter policybot.toml
    InitConfig,
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

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Profile { raw } => commands::profile::run(config_path, raw).await?,
        Commands::Retrieve { query } => commands::retrieve::run(config_path, &query).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::InitConfig => print!("{}", policybot_config::AppConfig::default_toml()),
    }

    Ok(())
}
