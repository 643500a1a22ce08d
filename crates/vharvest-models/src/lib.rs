//! Shared data models for the VHarvest batch harvester.
//!
//! This crate provides Serde-serializable types for:
//! - Input link records and watch-URL validation
//! - Artifact kinds, batch dates and deterministic storage keys
//! - Per-item outcomes and success policy
//! - Progress snapshots and ETA values
//! - Retry ledger rows

pub mod artifact;
pub mod ledger;
pub mod link;
pub mod outcome;
pub mod progress;

// Re-export common types
pub use artifact::{ArtifactKey, ArtifactKind, ArtifactState, BatchDate};
pub use ledger::LedgerRow;
pub use link::{
    canonical_watch_url, is_watch_url, validate_id_tag, LinkError, LinkRecord, LinkResult,
};
pub use outcome::{ArtifactStates, ItemDetail, ItemOutcome, ItemStatus, ItemSummary, SuccessPolicy};
pub use progress::{ProgressSnapshot, RemainingTime, RunStatus};
