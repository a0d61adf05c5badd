//! # offcache sync
//!
//! Reconciles the local entity store with a remote data service.
//!
//! This crate provides:
//! - The [`RemoteDataService`] contract and an [`InMemoryRemote`] for tests
//! - [`SyncOrchestrator`]: initial sync, incremental sync, the sync-needed
//!   heuristic, conflict handling and the outbound push
//! - [`SyncOutcome`] and [`ConflictRecord`], produced once per sync
//!
//! ## Architecture
//!
//! Every sync is **pull-then-push**:
//! 1. Fetch whole collections (all of them for an initial sync, only the
//!    ones the change synopsis marks dirty for an incremental sync)
//! 2. Merge them into the store, settling conflicts with the configured
//!    strategy
//! 3. Push every pending record
//!
//! ## Key Invariants
//!
//! - At most one sync runs at a time; a second caller fails fast
//! - The persisted `sync_in_progress` flag is cleared on every exit path
//! - Remote failures are reported in the outcome and never abort the sync
//! - A server copy never silently replaces an un-pushed local change

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod memory;
mod orchestrator;
mod outcome;
mod remote;

pub use config::{OrchestratorConfig, DEFAULT_STALENESS_WINDOW};
pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use memory::{InMemoryRemote, RemoteCalls};
pub use orchestrator::{SyncOrchestrator, SyncStats};
pub use outcome::{ConflictRecord, SyncOutcome};
pub use remote::{CollectionSynopsis, RemoteDataService, RemoteDocument};
