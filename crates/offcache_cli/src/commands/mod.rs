//! CLI command implementations.

pub mod clear;
pub mod metadata;
pub mod records;
pub mod stats;

use offcache_core::{EntityStore, StoreError, SystemClock};
use offcache_storage::{FileStore, StorageError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The cache directory does not exist.
    #[error("no cache found at {}", .0.display())]
    NotFound(PathBuf),

    /// A command that reads the cache was run without `--path`.
    #[error("cache path required for {0}")]
    PathRequired(&'static str),

    /// `--format` named a format the CLI does not print.
    #[error("unknown output format {0:?} (expected text or json)")]
    UnknownFormat(String),

    /// `clear` was run without `--yes`.
    #[error("refusing to clear without --yes")]
    Unconfirmed,

    /// The entity store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The directory could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// How command output is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned text for terminals.
    #[default]
    Text,
    /// Pretty JSON for scripts.
    Json,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(CliError::UnknownFormat(s.to_string())),
        }
    }
}

/// Opens the cache directory at `path`.
///
/// Fails if the directory does not exist; the CLI never creates a cache.
pub fn open_store(path: &Path) -> CliResult<EntityStore> {
    if !path.is_dir() {
        return Err(CliError::NotFound(path.to_path_buf()));
    }
    let kv = FileStore::open(path)?;
    Ok(EntityStore::open(Arc::new(kv), Arc::new(SystemClock))?)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
