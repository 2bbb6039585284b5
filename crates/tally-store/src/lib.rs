#![forbid(unsafe_code)]
//! Server-side storage for the tally sync core.
//!
//! Layering, leaf first: [`records`] (versioned record store with
//! compare-and-swap `put`), [`locks`] (period lock registry), [`audit`]
//! (append-only trail), [`users`] (directory + PIN verification). The
//! [`SyncStore`] facade composes them inside single `BEGIN IMMEDIATE`
//! transactions so a version bump and its audit entry commit together or
//! not at all.

pub mod audit;
mod error;
pub mod locks;
pub mod records;
mod schema;
mod store;
mod time;
pub mod users;

pub use error::StoreError;
pub use records::PutOutcome;
pub use store::{SyncStore, UpsertOutcome};
pub use time::now_rfc3339;

pub const CRATE_NAME: &str = "tally-store";
