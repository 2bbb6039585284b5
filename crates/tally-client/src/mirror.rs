// SPDX-License-Identifier: Apache-2.0

//! Durable, UI-shaped copy of all synced entities. Loaded synchronously at
//! startup so the UI never blocks on the network; written atomically
//! (tmp file + rename) so a crash mid-write cannot leave a torn blob.

use crate::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tally_api::EPOCH_WATERMARK;
use tally_model::{EntityKind, EntityRecord, PeriodLock, UserDirectoryEntry};

/// The whole persisted blob: one watermark scalar plus every table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorState {
    pub watermark: String,
    #[serde(default)]
    pub periods: Vec<PeriodLock>,
    #[serde(default)]
    pub users: Vec<UserDirectoryEntry>,
    #[serde(default)]
    pub tables: BTreeMap<EntityKind, BTreeMap<String, EntityRecord>>,
}

impl Default for MirrorState {
    fn default() -> Self {
        Self {
            watermark: EPOCH_WATERMARK.to_string(),
            periods: Vec::new(),
            users: Vec::new(),
            tables: BTreeMap::new(),
        }
    }
}

pub struct LocalMirror {
    state: MirrorState,
    path: Option<PathBuf>,
}

impl LocalMirror {
    /// Load the last durably-persisted state, or start empty. A corrupt
    /// or missing blob falls back to the epoch state; the next successful
    /// reconciliation rebuilds everything from the server.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        let state = std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self {
            state,
            path: Some(path.to_path_buf()),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: MirrorState::default(),
            path: None,
        }
    }

    #[must_use]
    pub fn watermark(&self) -> &str {
        &self.state.watermark
    }

    #[must_use]
    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&EntityRecord> {
        self.state.tables.get(&kind)?.get(id)
    }

    #[must_use]
    pub fn records(&self, kind: EntityKind) -> Vec<&EntityRecord> {
        self.state
            .tables
            .get(&kind)
            .map(|t| t.values().collect())
            .unwrap_or_default()
    }

    pub fn apply_bootstrap(
        &mut self,
        periods: Vec<PeriodLock>,
        users: Vec<UserDirectoryEntry>,
    ) -> Result<(), SyncError> {
        self.state.periods = periods;
        self.state.users = users;
        self.persist()
    }

    /// Apply one delta response: every returned record overwrites the
    /// mirror entry unconditionally (server always wins once delivered)
    /// and the watermark advances to the server-returned value, never to
    /// local wall-clock time. Applying the same response twice is a
    /// no-op the second time.
    pub fn apply_changes(
        &mut self,
        watermark: &str,
        tables: &BTreeMap<EntityKind, Vec<EntityRecord>>,
    ) -> Result<(), SyncError> {
        for (kind, rows) in tables {
            let table = self.state.tables.entry(*kind).or_default();
            for row in rows {
                table.insert(row.id.as_str().to_string(), row.clone());
            }
        }
        self.state.watermark = watermark.to_string();
        self.persist()
    }

    /// Optimistic local write. Returns the previous value so the caller
    /// can roll back on a hard rejection (a locked period can never
    /// succeed later, unlike a transient network failure).
    pub fn apply_local(
        &mut self,
        kind: EntityKind,
        record: EntityRecord,
    ) -> Result<Option<EntityRecord>, SyncError> {
        let previous = self
            .state
            .tables
            .entry(kind)
            .or_default()
            .insert(record.id.as_str().to_string(), record);
        self.persist()?;
        Ok(previous)
    }

    /// Undo one optimistic write, restoring the pre-mutation value (or
    /// removing the entry if the record did not exist before).
    pub fn restore(
        &mut self,
        kind: EntityKind,
        id: &str,
        previous: Option<EntityRecord>,
    ) -> Result<(), SyncError> {
        let table = self.state.tables.entry(kind).or_default();
        match previous {
            Some(record) => {
                table.insert(id.to_string(), record);
            }
            None => {
                table.remove(id);
            }
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), SyncError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&self.state).map_err(|e| SyncError::Persist(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| SyncError::Persist(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| SyncError::Persist(e.to_string()))?;
        Ok(())
    }
}
