use crate::period::{PeriodKey, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

pub const ID_MAX_LEN: usize = 64;

/// The entity tables replicated through the sync core. Table names are
/// resolved through this enum only; raw client strings never reach SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EntityKind {
    KpiEntries,
    MaintenanceTickets,
    Complaints,
    Leads,
}

pub const SYNCED_KINDS: [EntityKind; 4] = [
    EntityKind::KpiEntries,
    EntityKind::MaintenanceTickets,
    EntityKind::Complaints,
    EntityKind::Leads,
];

impl EntityKind {
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::KpiEntries => "kpi_entries",
            Self::MaintenanceTickets => "maintenance_tickets",
            Self::Complaints => "complaints",
            Self::Leads => "leads",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "kpi_entries" => Ok(Self::KpiEntries),
            "maintenance_tickets" => Ok(Self::MaintenanceTickets),
            "complaints" => Ok(Self::Complaints),
            "leads" => Ok(Self::Leads),
            other => Err(ValidationError(format!("unknown entity kind: {other}"))),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// Deserialization goes through [`RecordId::parse`]; empty or over-long
/// ids are rejected before they can reach a handler or the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "String")]
#[non_exhaustive]
pub struct RecordId(String);

impl RecordId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("record id must not be empty".to_string()));
        }
        if s.len() > ID_MAX_LEN {
            return Err(ValidationError(format!(
                "record id exceeds max length {ID_MAX_LEN}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One synced row. `version` is the optimistic-concurrency token: on the
/// wire it carries the version the writer last observed (0 for a brand-new
/// record); in storage it is the authoritative counter starting at 1.
/// `updated_at` is server-assigned RFC 3339 and monotonic per record.
/// `fields` is opaque to the sync core; deletion is modeled as a status
/// field inside it, never as row removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: RecordId,
    pub period: PeriodKey,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EntityRecord {
    #[must_use]
    pub fn new(id: RecordId, period: PeriodKey) -> Self {
        Self {
            id,
            period,
            version: 0,
            updated_at: None,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}
