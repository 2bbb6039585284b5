// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tally_model::EntityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ApiErrorCode {
    AuthRequired,
    InvalidCredentials,
    PeriodLocked,
    Conflict,
    InvalidRequest,
    Internal,
}

impl ApiErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::InvalidCredentials => "invalid_credentials",
            Self::PeriodLocked => "period_locked",
            Self::Conflict => "conflict",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(
            ApiErrorCode::AuthRequired,
            "missing x-actor-id header on mutating call",
            json!({}),
        )
    }

    #[must_use]
    pub fn period_locked(period: &str) -> Self {
        Self::new(
            ApiErrorCode::PeriodLocked,
            format!("period {period} is locked"),
            json!({"period": period}),
        )
    }

    /// Version conflict; the current server-side record rides in
    /// `details.server_record` so the caller can decide how to resolve.
    #[must_use]
    pub fn conflict(server_record: &EntityRecord) -> Self {
        Self::new(
            ApiErrorCode::Conflict,
            "version conflict",
            json!({"server_record": server_record}),
        )
    }

    #[must_use]
    pub fn server_record(&self) -> Option<EntityRecord> {
        serde_json::from_value(self.details.get("server_record")?.clone()).ok()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
    assert_traits::<ApiError>();
};
