// SPDX-License-Identifier: Apache-2.0

//! Append-only audit trail. Entries are never updated or deleted; the
//! sync core does no pruning.

use crate::StoreError;
use rusqlite::{params, Connection, Transaction};
use tally_model::{AuditAction, AuditEntry};

pub fn append(tx: &Transaction<'_>, entry: &AuditEntry) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO audit_log (ts, actor_id, action, entity, entity_id, payload_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.ts,
            entry.actor_id,
            entry.action.as_str(),
            entry.entity,
            entry.entity_id,
            serde_json::to_string(&entry.payload)?,
        ],
    )?;
    Ok(())
}

pub fn len(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Most recent entries, newest first. Tooling and test surface only.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<AuditEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT ts, actor_id, action, entity, entity_id, payload_json
         FROM audit_log ORDER BY seq DESC LIMIT ?1",
    )?;
    let mut rows = stmt.query(params![limit])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let action_raw: String = row.get(2)?;
        let action = match action_raw.as_str() {
            "UPSERT" => AuditAction::Upsert,
            "LOCK" => AuditAction::Lock,
            "UNLOCK" => AuditAction::Unlock,
            other => {
                return Err(StoreError::Corrupt(format!("unknown audit action: {other}")));
            }
        };
        let payload_json: String = row.get(5)?;
        out.push(AuditEntry {
            ts: row.get(0)?,
            actor_id: row.get(1)?,
            action,
            entity: row.get(3)?,
            entity_id: row.get(4)?,
            payload: serde_json::from_str(&payload_json)?,
        });
    }
    Ok(out)
}
