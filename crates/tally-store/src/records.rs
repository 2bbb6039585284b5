// SPDX-License-Identifier: Apache-2.0

//! Versioned record store: compare-and-swap writes over the per-entity
//! tables. The version expectation is enforced here and nowhere else.

use crate::StoreError;
use rusqlite::{params, Connection, Row, Transaction};
use tally_model::{EntityKind, EntityRecord, PeriodKey, RecordId};

/// Outcome of a compare-and-swap `put`. A conflict is a defined, expected
/// result carrying the current server-side record, never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted(EntityRecord),
    Conflict(EntityRecord),
}

fn record_from_row(row: &Row<'_>) -> Result<EntityRecord, StoreError> {
    let id: String = row.get(0)?;
    let period: String = row.get(1)?;
    let version: i64 = row.get(2)?;
    let updated_at: String = row.get(3)?;
    let fields_json: String = row.get(4)?;
    let fields = serde_json::from_str(&fields_json)?;
    Ok(EntityRecord {
        id: RecordId::parse(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        period: PeriodKey::parse(&period).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        version: u64::try_from(version)
            .map_err(|_| StoreError::Corrupt(format!("negative version for {id}")))?,
        updated_at: Some(updated_at),
        fields,
    })
}

pub fn get(
    conn: &Connection,
    kind: EntityKind,
    id: &RecordId,
) -> Result<Option<EntityRecord>, StoreError> {
    let sql = format!(
        "SELECT id, period, version, updated_at, fields_json FROM {} WHERE id = ?1",
        kind.table_name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.as_str()])?;
    match rows.next()? {
        None => Ok(None),
        Some(row) => Ok(Some(record_from_row(row)?)),
    }
}

/// All records of `kind` whose `updated_at` is at or after `watermark`.
/// The comparison is inclusive: a record stamped exactly at the watermark
/// is re-delivered rather than silently dropped, and delta application on
/// the client is idempotent, so re-delivery is harmless.
pub fn changed_since(
    conn: &Connection,
    kind: EntityKind,
    watermark: &str,
) -> Result<Vec<EntityRecord>, StoreError> {
    let sql = format!(
        "SELECT id, period, version, updated_at, fields_json FROM {} WHERE updated_at >= ?1",
        kind.table_name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![watermark])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(record_from_row(row)?);
    }
    Ok(out)
}

/// Compare-and-swap write. The wire `version` on `record` is the caller's
/// expectation: 0 means "no row exists yet", anything else must equal the
/// stored version. On acceptance the stored version is the expectation
/// plus one and `updated_at` becomes `now` (clamped so it never runs
/// backwards for the record).
pub fn put(
    tx: &Transaction<'_>,
    kind: EntityKind,
    record: &EntityRecord,
    now: &str,
) -> Result<PutOutcome, StoreError> {
    let current = get(tx, kind, &record.id)?;
    let fields_json = serde_json::to_string(&record.fields)?;
    match current {
        None => {
            if record.version != 0 {
                return Err(StoreError::ExpectedMissing {
                    id: record.id.as_str().to_string(),
                    expected: record.version,
                });
            }
            let sql = format!(
                "INSERT INTO {} (id, period, version, updated_at, fields_json)
                 VALUES (?1, ?2, 1, ?3, ?4)",
                kind.table_name()
            );
            tx.execute(
                &sql,
                params![record.id.as_str(), record.period.as_str(), now, fields_json],
            )?;
            let stored = get(tx, kind, &record.id)?
                .ok_or_else(|| StoreError::Corrupt("insert did not persist".to_string()))?;
            Ok(PutOutcome::Accepted(stored))
        }
        Some(current) => {
            if record.version != current.version {
                return Ok(PutOutcome::Conflict(current));
            }
            let next_version = i64::try_from(current.version + 1)
                .map_err(|_| StoreError::Corrupt("version overflow".to_string()))?;
            let updated_at = match current.updated_at.as_deref() {
                Some(prev) if prev > now => prev.to_string(),
                _ => now.to_string(),
            };
            let sql = format!(
                "UPDATE {} SET period = ?2, version = ?3, updated_at = ?4, fields_json = ?5
                 WHERE id = ?1",
                kind.table_name()
            );
            tx.execute(
                &sql,
                params![
                    record.id.as_str(),
                    record.period.as_str(),
                    next_version,
                    updated_at,
                    fields_json
                ],
            )?;
            let stored = get(tx, kind, &record.id)?
                .ok_or_else(|| StoreError::Corrupt("update did not persist".to_string()))?;
            Ok(PutOutcome::Accepted(stored))
        }
    }
}
