use thiserror::Error;

/// Storage failures are fatal for the single request that hit them and are
/// surfaced to the transport as internal errors. A version conflict is not
/// an error — see [`crate::PutOutcome`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("payload serialization failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {id} does not exist but expected version {expected} was supplied")]
    ExpectedMissing { id: String, expected: u64 },

    #[error("stored row is malformed: {0}")]
    Corrupt(String),
}
