#![forbid(unsafe_code)]
//! Offline-first client side of the tally sync core: a durable local
//! mirror of all synced entities plus the orchestrator that reconciles it
//! with the server of record.

mod error;
mod mirror;
mod sync;

pub use error::SyncError;
pub use mirror::{LocalMirror, MirrorState};
pub use sync::{ConflictPolicy, CycleOutcome, SubmitOutcome, SyncConfig, SyncOrchestrator};

pub const CRATE_NAME: &str = "tally-client";
