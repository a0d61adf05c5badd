//! Conflict strategies and resolutions.

use serde::{Deserialize, Serialize};

/// How a record is settled once a conflict has been detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Keep the local version; it will be pushed.
    KeepLocal,
    /// Take the server version.
    AcceptRemote,
    /// Overlay local fields on the server object; the result will be pushed.
    Merge,
    /// Leave the record in conflict for the application to settle.
    Skip,
}

/// Policy for automatic conflict resolution, persisted in the sync config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// Server always wins.
    ServerWins,
    /// Client always wins.
    ClientWins,
    /// Whole-record overlay of local fields on the server copy.
    Merge,
    /// Collect conflicts and wait for an explicit resolution.
    #[default]
    Manual,
}

impl ConflictStrategy {
    /// Returns true if this strategy settles conflicts without the application.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictStrategy::Manual)
    }

    /// The resolution this strategy applies to every conflict.
    pub fn resolution(&self) -> ConflictResolution {
        match self {
            ConflictStrategy::ServerWins => ConflictResolution::AcceptRemote,
            ConflictStrategy::ClientWins => ConflictResolution::KeepLocal,
            ConflictStrategy::Merge => ConflictResolution::Merge,
            ConflictStrategy::Manual => ConflictResolution::Skip,
        }
    }
}
