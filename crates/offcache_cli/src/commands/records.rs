//! Record listing commands: `list`, `pending` and `conflicts`.

use super::{open_store, print_json, CliResult, OutputFormat};
use offcache_core::{CollectionTag, EntityRecord, EntityStore, SyncStatus};
use serde::Serialize;
use std::path::Path;

/// One record, as shown to operators.
#[derive(Debug, Serialize)]
pub struct RecordRow {
    /// Collection.
    pub collection: CollectionTag,
    /// Record id.
    pub id: String,
    /// Record version.
    pub version: u64,
    /// Sync status.
    pub status: SyncStatus,
    /// Tombstone flag.
    pub deleted: bool,
    /// Last modification, in milliseconds since the epoch.
    pub last_modified: u64,
    /// The payload.
    pub payload: serde_json::Value,
    /// The server payload of a record in conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_payload: Option<serde_json::Value>,
}

impl From<EntityRecord> for RecordRow {
    fn from(record: EntityRecord) -> Self {
        Self {
            collection: record.entity_type,
            id: record.id,
            version: record.version,
            status: record.sync_status,
            deleted: record.is_deleted,
            last_modified: record.last_modified.as_millis(),
            payload: record.payload,
            server_payload: record.conflict_payload,
        }
    }
}

/// Runs the list command.
pub fn list(
    path: &Path,
    collection: CollectionTag,
    include_deleted: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let store = open_store(path)?;
    let records = if include_deleted {
        store.all_records(collection)?
    } else {
        store.get_all(collection)?
    };
    output(rows(records), format)
}

/// Runs the pending command.
pub fn pending(path: &Path, format: OutputFormat) -> CliResult<()> {
    let store = open_store(path)?;
    let records = store.all_pending()?.into_values().flatten().collect();
    output(rows(records), format)
}

/// Runs the conflicts command.
pub fn conflicts(path: &Path, format: OutputFormat) -> CliResult<()> {
    let store = open_store(path)?;
    output(rows(with_status(&store, SyncStatus::Conflict)?), format)
}

fn with_status(
    store: &EntityStore,
    status: SyncStatus,
) -> CliResult<Vec<EntityRecord>> {
    let mut records = Vec::new();
    for tag in CollectionTag::ALL {
        records.extend(store.with_status(tag, status)?);
    }
    Ok(records)
}

fn rows(records: Vec<EntityRecord>) -> Vec<RecordRow> {
    records.into_iter().map(RecordRow::from).collect()
}

fn output(rows: Vec<RecordRow>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("(no records)");
            }
            for row in &rows {
                println!(
                    "{:<20} {:<40} v{:<5} {:?}{}",
                    row.collection.as_str(),
                    row.id,
                    row.version,
                    row.status,
                    if row.deleted { " (deleted)" } else { "" }
                );
            }
        }
    }
    Ok(())
}
