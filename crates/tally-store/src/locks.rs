// SPDX-License-Identifier: Apache-2.0

//! Period lock registry. Periods come into existence on first reference
//! and persist indefinitely; an unseen period is unlocked.

use crate::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tally_model::{PeriodKey, PeriodLock};

pub fn is_locked(conn: &Connection, period: &PeriodKey) -> Result<bool, StoreError> {
    let locked: Option<i64> = conn
        .query_row(
            "SELECT is_locked FROM periods WHERE period = ?1",
            params![period.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(locked.unwrap_or(0) != 0)
}

pub fn get(conn: &Connection, period: &PeriodKey) -> Result<Option<PeriodLock>, StoreError> {
    let row = conn
        .query_row(
            "SELECT period, is_locked, locked_at, locked_by, reason
             FROM periods WHERE period = ?1",
            params![period.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;
    match row {
        None => Ok(None),
        Some((period, locked, locked_at, locked_by, reason)) => Ok(Some(PeriodLock {
            period: PeriodKey::parse(&period).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            is_locked: locked != 0,
            locked_at,
            locked_by,
            reason,
        })),
    }
}

pub fn all(conn: &Connection) -> Result<Vec<PeriodLock>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT period, is_locked, locked_at, locked_by, reason FROM periods ORDER BY period",
    )?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let period: String = row.get(0)?;
        let locked: i64 = row.get(1)?;
        out.push(PeriodLock {
            period: PeriodKey::parse(&period).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            is_locked: locked != 0,
            locked_at: row.get(2)?,
            locked_by: row.get(3)?,
            reason: row.get(4)?,
        });
    }
    Ok(out)
}

pub fn ensure_period(conn: &Connection, period: &PeriodKey) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO periods (period, is_locked) VALUES (?1, 0)",
        params![period.as_str()],
    )?;
    Ok(())
}

/// Idempotent lock flip. Metadata is written only on the transition to
/// locked; unlocking flips the flag and leaves the historical metadata in
/// place. The matching LOCK/UNLOCK audit entry is appended by the caller
/// inside the same transaction.
pub fn set_lock(
    tx: &Transaction<'_>,
    period: &PeriodKey,
    locked: bool,
    actor: &str,
    reason: Option<&str>,
    now: &str,
) -> Result<PeriodLock, StoreError> {
    if locked {
        tx.execute(
            "INSERT INTO periods (period, is_locked, locked_at, locked_by, reason)
             VALUES (?1, 1, ?2, ?3, ?4)
             ON CONFLICT(period) DO UPDATE SET
                is_locked = 1, locked_at = ?2, locked_by = ?3, reason = ?4",
            params![period.as_str(), now, actor, reason],
        )?;
    } else {
        tx.execute(
            "INSERT INTO periods (period, is_locked) VALUES (?1, 0)
             ON CONFLICT(period) DO UPDATE SET is_locked = 0",
            params![period.as_str()],
        )?;
    }
    get(tx, period)?.ok_or_else(|| StoreError::Corrupt("period row missing after set_lock".to_string()))
}
