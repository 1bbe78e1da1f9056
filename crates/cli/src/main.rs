//! kbagent CLI: the operator's view of the knowledge base and tools.
//!
//! Commands:
//! - `search`  Retrieve context for a query from the foundation
//! - `ingest`  Ingest the foundation and report index statistics
//! - `tools`   List built-in tool specs as JSON
//! - `config`  Inspect configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "kbagent",
    about = "kbagent: knowledge-grounded tool-calling agent runtime",
    version
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
    /// Print the retrieved-context block for a query
    Search {
        query: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long, default_value_t = 4)]
        top_k: usize,

        /// Foundation directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print each hit with its score instead of the context block
        #[arg(long)]
        scores: bool,
    },

    /// Ingest the foundation and print index statistics
    Ingest {
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// List built-in tool specs as JSON
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            query,
            top_k,
            dir,
            scores,
        } => commands::search::run(&query, top_k, dir, scores).await?,
        Commands::Ingest { dir } => commands::ingest::run(dir).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
