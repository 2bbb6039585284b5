#![forbid(unsafe_code)]
//! Tally domain model SSOT.

mod audit;
mod period;
mod record;
mod user;

pub use audit::{AuditAction, AuditEntry};
pub use period::{PeriodKey, PeriodLock, ValidationError, PERIOD_KEY_LEN};
pub use record::{EntityKind, EntityRecord, RecordId, ID_MAX_LEN, SYNCED_KINDS};
pub use user::{Role, UserDirectoryEntry};

pub const CRATE_NAME: &str = "tally-model";
