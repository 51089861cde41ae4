//! RoleMatch CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Initialize config
//! - `status`: Show effective configuration
//! - `doctor`: Diagnose config and oracle connectivity
//! - `assign`: Run the pipeline for one roster file
//! - `batch`: Run the pipeline for many roster files

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rolematch",
    about = "RoleMatch — LLM-scored optimal role assignment",
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
    /// Initialize configuration
    Onboard,

    /// Show effective configuration
    Status,

    /// Diagnose configuration and oracle connectivity
    Doctor,

    /// Assign roles for one roster
    Assign {
        /// Roster JSON file: {"name": ..., "members": [...]}
        #[arg(short, long)]
        roster: PathBuf,

        /// Comma-separated custom role names (runs the secondary phase)
        #[arg(long)]
        roles: Option<String>,
    },

    /// Assign roles for several rosters at once
    Batch {
        /// Roster JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print pairing details and score statistics per roster
        #[arg(short, long)]
        details: bool,
    },
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
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Assign { roster, roles } => commands::assign::run(roster, roles).await?,
        Commands::Batch { files, details } => commands::batch::run(files, details).await?,
    }

    Ok(())
}
