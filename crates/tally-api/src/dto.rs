// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_model::{EntityKind, EntityRecord, PeriodKey, PeriodLock, UserDirectoryEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub pin: String,
}

/// Full server-side configuration a cold client needs before pulling bulk
/// data: period locks and the user directory. Entity rows arrive through
/// `changes` from the epoch watermark, never through bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapResponse {
    pub periods: Vec<PeriodLock>,
    pub users: Vec<UserDirectoryEntry>,
}

/// Delta since a watermark. `watermark` is stamped when the server began
/// servicing the request, not when it finished, so a write landing mid-query
/// is covered by the next poll. Per-kind lists carry no ordering guarantee;
/// clients must apply them as a replacing set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangesResponse {
    pub watermark: String,
    pub tables: BTreeMap<EntityKind, Vec<EntityRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertRequest {
    pub entity: EntityKind,
    pub record: EntityRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertResponse {
    pub status: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLockRequest {
    pub period: PeriodKey,
    pub lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLockResponse {
    pub status: String,
    pub period: PeriodKey,
}
