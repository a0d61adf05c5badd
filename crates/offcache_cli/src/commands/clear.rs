//! Clear command implementation.

use super::{open_store, CliError, CliResult};
use std::path::Path;
use tracing::info;

/// Runs the clear command.
pub fn run(path: &Path, confirmed: bool) -> CliResult<()> {
    if !confirmed {
        return Err(CliError::Unconfirmed);
    }

    let store = open_store(path)?;
    let before = store.storage_stats()?;
    store.clear_all()?;
    info!(path = %path.display(), "cache cleared");

    println!(
        "Cleared {} records from {:?}",
        before.total_entities, path
    );
    Ok(())
}
