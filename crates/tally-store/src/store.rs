use crate::records::PutOutcome;
use crate::time::now_rfc3339;
use crate::{audit, locks, records, schema, users, StoreError};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use tally_model::{
    AuditAction, AuditEntry, EntityKind, EntityRecord, PeriodKey, PeriodLock, RecordId,
    UserDirectoryEntry, SYNCED_KINDS,
};

/// Outcome of one write attempt. `PeriodLocked` and `Conflict` are
/// terminal for the attempt, not for the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Accepted(EntityRecord),
    Conflict(EntityRecord),
    PeriodLocked(PeriodKey),
}

/// Facade over the storage modules. Owns the connection; every mutating
/// operation runs inside a single `BEGIN IMMEDIATE` transaction, so the
/// version bump and its audit entry are atomic and two writers cannot
/// interleave the read-check-write of the version comparison.
pub struct SyncStore {
    conn: Connection,
}

impl SyncStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, kind: EntityKind, id: &RecordId) -> Result<Option<EntityRecord>, StoreError> {
        records::get(&self.conn, kind, id)
    }

    pub fn bootstrap(&self) -> Result<(Vec<PeriodLock>, Vec<UserDirectoryEntry>), StoreError> {
        Ok((locks::all(&self.conn)?, users::directory(&self.conn)?))
    }

    /// Records changed at or after `watermark`, across every synced kind.
    /// The caller stamps the response watermark before invoking this, at
    /// the moment it began servicing the request.
    pub fn changes_since(
        &self,
        watermark: &str,
    ) -> Result<BTreeMap<EntityKind, Vec<EntityRecord>>, StoreError> {
        let mut tables = BTreeMap::new();
        for kind in SYNCED_KINDS {
            tables.insert(kind, records::changed_since(&self.conn, kind, watermark)?);
        }
        Ok(tables)
    }

    /// Lock check, compare-and-swap, audit — one transaction. A rejected
    /// write (locked period or version conflict) rolls the transaction
    /// back with no state change and no audit entry.
    pub fn upsert(
        &mut self,
        kind: EntityKind,
        record: &EntityRecord,
        actor: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if locks::is_locked(&tx, &record.period)? {
            return Ok(UpsertOutcome::PeriodLocked(record.period.clone()));
        }
        locks::ensure_period(&tx, &record.period)?;
        let outcome = match records::put(&tx, kind, record, &now)? {
            PutOutcome::Conflict(current) => UpsertOutcome::Conflict(current),
            PutOutcome::Accepted(stored) => {
                audit::append(
                    &tx,
                    &AuditEntry {
                        ts: now,
                        actor_id: actor.to_string(),
                        action: AuditAction::Upsert,
                        entity: kind.table_name().to_string(),
                        entity_id: stored.id.as_str().to_string(),
                        payload: serde_json::to_value(&stored)?,
                    },
                )?;
                tx.commit()?;
                return Ok(UpsertOutcome::Accepted(stored));
            }
        };
        // Conflict path: drop the transaction without committing.
        Ok(outcome)
    }

    /// Idempotent, audited lock flip.
    pub fn set_lock(
        &mut self,
        period: &PeriodKey,
        locked: bool,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<PeriodLock, StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let lock = locks::set_lock(&tx, period, locked, actor, reason, &now)?;
        audit::append(
            &tx,
            &AuditEntry {
                ts: now,
                actor_id: actor.to_string(),
                action: if locked {
                    AuditAction::Lock
                } else {
                    AuditAction::Unlock
                },
                entity: "periods".to_string(),
                entity_id: period.as_str().to_string(),
                payload: serde_json::to_value(&lock)?,
            },
        )?;
        tx.commit()?;
        Ok(lock)
    }

    pub fn is_locked(&self, period: &PeriodKey) -> Result<bool, StoreError> {
        locks::is_locked(&self.conn, period)
    }

    pub fn ensure_period(&self, period: &PeriodKey) -> Result<(), StoreError> {
        locks::ensure_period(&self.conn, period)
    }

    pub fn verify_login(
        &self,
        username: &str,
        pin: &str,
    ) -> Result<Option<UserDirectoryEntry>, StoreError> {
        users::verify_login(&self.conn, username, pin)
    }

    pub fn add_user(
        &self,
        entry: &UserDirectoryEntry,
        username: &str,
        pin: &str,
    ) -> Result<(), StoreError> {
        users::insert(&self.conn, entry, username, pin, &now_rfc3339())
    }

    pub fn audit_len(&self) -> Result<u64, StoreError> {
        audit::len(&self.conn)
    }

    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, StoreError> {
        audit::recent(&self.conn, limit)
    }
}
