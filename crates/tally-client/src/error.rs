use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Server unreachable. Degrades the client to local-only mode; never
    /// surfaced to the end user as a hard failure.
    #[error("server unreachable: {0}")]
    Offline(String),

    #[error("unexpected http response: {0}")]
    Http(String),

    #[error("response decode failure: {0}")]
    Decode(String),

    #[error("mirror persistence failure: {0}")]
    Persist(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Offline(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
