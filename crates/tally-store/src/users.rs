// SPDX-License-Identifier: Apache-2.0

//! User directory and PIN verification. PINs are stored as salted SHA-256
//! digests and compared in constant time; hashes never leave this module.

use crate::StoreError;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tally_model::{Role, UserDirectoryEntry};

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn hash_pin(salt: &str, pin: &str) -> String {
    sha256_hex(format!("{salt}:{pin}").as_bytes())
}

fn fresh_salt() -> String {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    let mut out = String::with_capacity(raw.len() * 2);
    for b in raw {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

pub fn insert(
    conn: &Connection,
    entry: &UserDirectoryEntry,
    username: &str,
    pin: &str,
    now: &str,
) -> Result<(), StoreError> {
    let salt = fresh_salt();
    let pin_hash = hash_pin(&salt, pin);
    conn.execute(
        "INSERT OR IGNORE INTO users (id, name, username, pin_salt, pin_hash, role, dept, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id,
            entry.name,
            username,
            salt,
            pin_hash,
            entry.role.as_str(),
            entry.dept,
            now
        ],
    )?;
    Ok(())
}

pub fn directory(conn: &Connection) -> Result<Vec<UserDirectoryEntry>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, role, dept FROM users ORDER BY id")?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let role_raw: String = row.get(2)?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role: {role_raw}")))?;
        out.push(UserDirectoryEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            role,
            dept: row.get(3)?,
        });
    }
    Ok(out)
}

pub fn verify_login(
    conn: &Connection,
    username: &str,
    pin: &str,
) -> Result<Option<UserDirectoryEntry>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, role, dept, pin_salt, pin_hash FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, name, role_raw, dept, salt, stored_hash)) = row else {
        return Ok(None);
    };
    let candidate = hash_pin(&salt, pin);
    if candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into() {
        let role = Role::parse(&role_raw)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role: {role_raw}")))?;
        Ok(Some(UserDirectoryEntry {
            id,
            name,
            role,
            dept,
        }))
    } else {
        Ok(None)
    }
}
