//! Fetchkit CLI - Main Entry Point
//!
//! Command-line front end for the fetch hook and the REST user service.

use clap::{Parser, Subcommand};
use fetchkit_common::ApiClient;
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{get, retry, users};
use config::FetchkitConfig;

/// Fetchkit CLI - cancellable HTTP fetching with a typed REST client
#[derive(Parser)]
#[command(name = "fetchkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ~/.fetchkit/config.toml)
    #[arg(long, global = true, env = "FETCHKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL once and print the settled request state
    Get(get::GetArgs),

    /// Manage users through the REST API
    #[command(subcommand)]
    Users(users::UserCommands),

    /// Fetch an API path with exponential backoff
    Retry(retry::RetryArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(fetchkit_common::default_config_path);
    let config = FetchkitConfig::load(&config_path)?;
    tracing::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Commands::Get(args) => get::execute(args, config.fetch, cli.format).await?,
        Commands::Users(cmd) => {
            let api = ApiClient::new(&config.api)?;
            users::execute(cmd, api, cli.format).await?
        }
        Commands::Retry(args) => {
            let api = ApiClient::new(&config.api)?;
            retry::execute(args, api, config.retry, cli.format).await?
        }
        Commands::Config(cmd) => commands::config::execute(cmd, &config, &config_path)?,
        Commands::Version => {
            println!("Fetchkit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Library: fetchkit-common v{}", fetchkit_common::VERSION);
        }
    }

    Ok(())
}
