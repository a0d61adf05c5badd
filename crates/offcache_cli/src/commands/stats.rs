//! Stats command implementation.

use super::{format_size, open_store, print_json, CliResult, OutputFormat};
use offcache_core::{ConflictStrategy, StorageStats, SyncConfig};
use serde::Serialize;
use std::path::Path;

/// Stats command result.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    /// Cache path.
    pub path: String,
    /// Record counts and size.
    pub storage: StorageStats,
    /// The persisted sync config.
    pub sync: SyncSummary,
}

/// The persisted sync config, as shown to operators.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Last completed sync, in milliseconds since the epoch.
    pub last_sync: u64,
    /// Last completed full sync, in milliseconds since the epoch.
    pub last_full_sync: u64,
    /// Whether a sync was running when the cache was last written.
    pub sync_in_progress: bool,
    /// Configured conflict strategy.
    pub strategy: ConflictStrategy,
    /// Signed-in user, if any.
    pub user_id: Option<String>,
    /// Data version.
    pub data_version: u32,
}

impl From<SyncConfig> for SyncSummary {
    fn from(config: SyncConfig) -> Self {
        Self {
            last_sync: config.last_sync_timestamp.as_millis(),
            last_full_sync: config.last_full_sync.as_millis(),
            sync_in_progress: config.sync_in_progress,
            strategy: config.conflict_resolution_strategy,
            user_id: config.user_id,
            data_version: config.data_version,
        }
    }
}

/// Runs the stats command.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<()> {
    let store = open_store(path)?;
    let result = StatsResult {
        path: path.display().to_string(),
        storage: store.storage_stats()?,
        sync: store.load_config()?.into(),
    };

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &StatsResult) {
    let storage = &result.storage;
    let sync = &result.sync;

    println!("offcache Cache Statistics");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Records:");
    println!("  Live entities: {}", storage.total_entities);
    println!("  Pending:       {}", storage.pending_sync_count);
    println!("  Conflicts:     {}", storage.conflict_count);
    println!("  Rejected:      {}", storage.error_count);
    println!("  Size:          {}", format_size(storage.cache_size_estimate));
    println!();
    println!("Sync:");
    match storage.last_sync {
        Some(at) => println!("  Last sync:     {}", at),
        None => println!("  Last sync:     never"),
    }
    println!("  Strategy:      {:?}", sync.strategy);
    println!("  User:          {}", sync.user_id.as_deref().unwrap_or("-"));
    println!("  Data version:  {}", sync.data_version);
    if sync.sync_in_progress {
        println!("  WARNING: the last sync did not finish");
    }
}
