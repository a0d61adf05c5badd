//! offcache CLI
//!
//! Command-line tools for inspecting a file-backed offcache directory.
//!
//! # Commands
//!
//! - `stats` - Display cache statistics and the sync config
//! - `list` - List the live records of a collection
//! - `pending` - List records waiting to be pushed
//! - `conflicts` - List records waiting for a conflict resolution
//! - `metadata` - Show per-collection metadata
//! - `clear` - Wipe the cache

mod commands;

use clap::{Parser, Subcommand};
use commands::{CliError, OutputFormat};
use offcache_core::CollectionTag;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offcache command-line cache tools.
#[derive(Parser)]
#[command(name = "offcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display cache statistics and the sync config
    Stats,

    /// List the live records of a collection
    List {
        /// Collection name (e.g. teams, user_preferences)
        collection: CollectionTag,

        /// Include tombstones
        #[arg(short, long)]
        deleted: bool,
    },

    /// List records waiting to be pushed
    Pending,

    /// List records waiting for a conflict resolution
    Conflicts,

    /// Show per-collection metadata
    Metadata,

    /// Wipe every collection, the metadata and the sync config
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let format: OutputFormat = cli.format.parse()?;
    match cli.command {
        Commands::Stats => {
            let path = cli.path.ok_or(CliError::PathRequired("stats"))?;
            commands::stats::run(&path, format)?;
        }
        Commands::List {
            collection,
            deleted,
        } => {
            let path = cli.path.ok_or(CliError::PathRequired("list"))?;
            commands::records::list(&path, collection, deleted, format)?;
        }
        Commands::Pending => {
            let path = cli.path.ok_or(CliError::PathRequired("pending"))?;
            commands::records::pending(&path, format)?;
        }
        Commands::Conflicts => {
            let path = cli.path.ok_or(CliError::PathRequired("conflicts"))?;
            commands::records::conflicts(&path, format)?;
        }
        Commands::Metadata => {
            let path = cli.path.ok_or(CliError::PathRequired("metadata"))?;
            commands::metadata::run(&path, format)?;
        }
        Commands::Clear { yes } => {
            let path = cli.path.ok_or(CliError::PathRequired("clear"))?;
            commands::clear::run(&path, yes)?;
        }
        Commands::Version => {
            println!("offcache CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Data version {}", offcache_core::DATA_VERSION);
        }
    }

    Ok(())
}
