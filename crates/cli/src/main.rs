//! Tristore CLI - Database migrations and id sequence maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply relational migrations
//! tristore migrate
//!
//! # Raise every id sequence above the highest stored id
//! tristore sequences sync
//!
//! # Show current sequence values next to the highest stored ids
//! tristore sequences show
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sequences sync` - Seed id sequences from existing rows
//! - `sequences show` - Print sequence values

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tristore")]
#[command(author, version, about = "Tristore CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage id sequences
    Sequences {
        #[command(subcommand)]
        action: SequenceAction,
    },
}

#[derive(Subcommand)]
enum SequenceAction {
    /// Advance every sequence to the highest id stored in its table
    Sync,
    /// Print sequence values and the highest stored ids
    Show,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tristore_engine=info,tristore_cli=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sequences { action } => match action {
            SequenceAction::Sync => commands::sequences::sync().await?,
            SequenceAction::Show => commands::sequences::show().await?,
        },
    }
    Ok(())
}
