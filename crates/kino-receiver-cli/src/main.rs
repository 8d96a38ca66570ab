//! Kino Receiver CLI - Headless receiver process
//!
//! Features:
//! - Answers load commands read as JSON lines
//! - One-shot loads for a URI or catalog id
//! - Effective configuration dump

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Kino Receiver - load bridge for remote playback
#[derive(Parser)]
#[command(name = "kino-receiver")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Headless media receiver with engine readiness gating", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer load commands read from stdin, one JSON object per line
    Serve,

    /// Load a single item
    Load {
        /// Direct manifest URI or catalog content id
        content_ref: Option<String>,

        /// MIME type for a direct URI
        #[arg(short, long)]
        mime_type: Option<String>,

        /// Full load command as JSON (overrides the positional arguments)
        #[arg(long)]
        command: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            commands::serve(config, &cli.format).await?;
        }
        Commands::Load { content_ref, mime_type, command } => {
            let command = commands::build_command(content_ref, mime_type, command)?;
            commands::load(config, command, &cli.format).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
