//! Chronik CLI - Command-line interface for chronik event stores

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "chronik")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the database directory
    #[arg(short, long, default_value = "./data")]
    db_path: PathBuf,

    /// TOML file with store, checkpoint and SQLite settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the event table (overrides the config file)
    #[arg(short, long)]
    table: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the schema needs to be set up
    Status,

    /// Create or migrate the event and checkpoint tables
    Setup,

    /// Print events as JSON lines
    Read(commands::read::ReadArgs),

    /// Show the stored position of a subscriber
    Checkpoint {
        /// Subscriber id
        subscriber: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.table)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            commands::status::execute(cli.db_path, config)?;
        }
        Commands::Setup => {
            commands::setup::execute(cli.db_path, config)?;
        }
        Commands::Read(args) => {
            commands::read::execute(cli.db_path, config, args)?;
        }
        Commands::Checkpoint { subscriber } => {
            commands::checkpoint::execute(cli.db_path, config, &subscriber)?;
        }
    }

    Ok(())
}
