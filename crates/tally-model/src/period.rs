use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const PERIOD_KEY_LEN: usize = 7;

/// Calendar-month partition key in `YYYY-MM` form. Every synced record
/// belongs to exactly one period; a locked period rejects all writes.
/// Deserialization goes through [`PeriodKey::parse`], so a wire value that
/// is padded or malformed can never reach storage or the lock registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "String")]
#[non_exhaustive]
pub struct PeriodKey(String);

impl PeriodKey {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.len() != PERIOD_KEY_LEN {
            return Err(ValidationError(format!(
                "period key must be YYYY-MM ({PERIOD_KEY_LEN} chars), got {:?}",
                s
            )));
        }
        let (year, rest) = s.split_at(4);
        if !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError("period year must be numeric".to_string()));
        }
        let month = rest
            .strip_prefix('-')
            .ok_or_else(|| ValidationError("period key must use YYYY-MM".to_string()))?;
        if month.len() != 2 || !month.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError("period month must be two digits".to_string()));
        }
        let m: u32 = month
            .parse()
            .map_err(|_| ValidationError("period month must be numeric".to_string()))?;
        if !(1..=12).contains(&m) {
            return Err(ValidationError(format!("period month out of range: {month}")));
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

impl TryFrom<String> for PeriodKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock state of one period. Metadata fields are set only on the
/// transition to locked and carried verbatim afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodLock {
    pub period: PeriodKey,
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PeriodLock {
    #[must_use]
    pub fn unlocked(period: PeriodKey) -> Self {
        Self {
            period,
            is_locked: false,
            locked_at: None,
            locked_by: None,
            reason: None,
        }
    }
}
