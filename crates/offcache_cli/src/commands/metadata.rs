//! Metadata command implementation.

use super::{open_store, print_json, CliResult, OutputFormat};
use offcache_core::{CollectionMetadata, CollectionTag};
use serde::Serialize;
use std::path::Path;

/// Metadata of one collection.
#[derive(Debug, Serialize)]
pub struct MetadataRow {
    /// Collection.
    pub collection: CollectionTag,
    /// Stored metadata, if the collection was ever written.
    pub metadata: Option<CollectionMetadata>,
}

/// Runs the metadata command.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<()> {
    let store = open_store(path)?;
    let mut rows = Vec::with_capacity(CollectionTag::ALL.len());
    for tag in CollectionTag::ALL {
        rows.push(MetadataRow {
            collection: tag,
            metadata: store.metadata(tag)?,
        });
    }

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            println!(
                "{:<20} {:>8} {:>8} {:>15} {:>15}",
                "collection", "records", "version", "updated", "remote"
            );
            for row in &rows {
                match &row.metadata {
                    Some(meta) => println!(
                        "{:<20} {:>8} {:>8} {:>15} {:>15}",
                        row.collection.as_str(),
                        meta.record_count,
                        meta.version,
                        meta.last_updated.as_millis(),
                        meta.remote_updated
                            .map(|t| t.as_millis().to_string())
                            .unwrap_or_else(|| "-".into())
                    ),
                    None => println!("{:<20} {:>8}", row.collection.as_str(), "-"),
                }
            }
        }
    }
    Ok(())
}
