//! RagChat CLI: the main entry point.
//!
//! Commands:
//! - `onboard`   : Write the default config file
//! - `chat`      : Interactive or single-message chat over your documents
//! - `providers` : List supported LLM providers
//! - `doctor`    : Diagnose configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "RagChat — chat with your documents",
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
    /// Write the default configuration to ~/.ragchat/config.toml
    Onboard,

    /// Chat with your documents
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Provider to answer with (groq, openai, gemini, deepseek)
        #[arg(short, long)]
        provider: Option<String>,

        /// Documents to load before chatting
        #[arg(short, long = "doc", num_args = 1..)]
        docs: Vec<PathBuf>,
    },

    /// List supported LLM providers
    Providers,

    /// Diagnose configuration and API keys
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            message,
            provider,
            docs,
        } => commands::chat::run(message, provider, docs).await?,
        Commands::Providers => commands::providers::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
