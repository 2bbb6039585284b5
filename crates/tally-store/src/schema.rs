use crate::StoreError;
use rusqlite::Connection;
use tally_model::SYNCED_KINDS;

/// One entity table per synced kind. Entity-specific columns of the
/// business schema are carried opaquely in `fields_json`; the sync core
/// owns only the identity, period, version, and timestamp columns.
fn entity_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            period TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            fields_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_updated_at ON {table} (updated_at);"
    )
}

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT UNIQUE NOT NULL,
            pin_salt TEXT NOT NULL,
            pin_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            dept TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS periods (
            period TEXT PRIMARY KEY,
            is_locked INTEGER NOT NULL DEFAULT 0,
            locked_at TEXT,
            locked_by TEXT,
            reason TEXT
        );
        CREATE TABLE IF NOT EXISTS audit_log (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            action TEXT NOT NULL,
            entity TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload_json TEXT NOT NULL
        );",
    )?;
    for kind in SYNCED_KINDS {
        conn.execute_batch(&entity_table_sql(kind.table_name()))?;
    }
    Ok(())
}
