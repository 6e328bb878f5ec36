//! # MTG Judge CLI (`judge`)
//!
//! ## Usage
//!
//! ```bash
//! judge --config ./config/judge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `judge init` | Create the index file and schema |
//! | `judge index build --rules <file>` | Segment and embed the comprehensive rules |
//! | `judge stats` | Show what the index holds |
//! | `judge ask "<query>"` | Answer one question, print JSON |
//! | `judge chat` | Interactive session |
//! | `judge serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`, `warn` for `ask` and `chat`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mtg_judge::{chat_cmd, config, index_cmd, migrate, server};

/// MTG Judge — rules answers grounded in the comprehensive rules and
/// official card data.
#[derive(Parser)]
#[command(
    name = "judge",
    about = "MTG Judge — a rules assistant grounded in the comprehensive rules and card data",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/judge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index schema.
    ///
    /// Creates the SQLite file and its tables. Idempotent.
    Init,

    /// Manage the rules index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show index statistics.
    Stats,

    /// Answer a single question and print the turn as JSON.
    Ask {
        /// The question.
        query: String,

        /// Use the deep model tier.
        #[arg(long)]
        deep: bool,

        /// Prior conversation entries, alternating user/assistant, oldest first.
        #[arg(long = "history")]
        history: Vec<String>,
    },

    /// Start an interactive session.
    Chat {
        /// Start on the deep model tier.
        #[arg(long)]
        deep: bool,
    },

    /// Start the HTTP API.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Segment a comprehensive rules text file, embed it, and replace the index.
    Build {
        /// Path to the comprehensive rules (plain text).
        #[arg(long)]
        rules: PathBuf,

        /// Report segment counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(command: &Commands) -> anyhow::Result<()> {
    let default_level = match command {
        Commands::Ask { .. } | Commands::Chat { .. } => "warn",
        _ => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.command)?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg.index.path).await?;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Index {
            action: IndexAction::Build { rules, dry_run },
        } => {
            index_cmd::run_index_build(&cfg, &rules, dry_run).await?;
        }
        Commands::Stats => {
            index_cmd::run_stats(&cfg).await?;
        }
        Commands::Ask {
            query,
            deep,
            history,
        } => {
            chat_cmd::run_ask(&cfg, &query, history, deep).await?;
        }
        Commands::Chat { deep } => {
            chat_cmd::run_chat(&cfg, deep).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
