#![forbid(unsafe_code)]
//! Wire contract shared by the tally server and client.

mod dto;
mod errors;

pub use dto::{
    BootstrapResponse, ChangesResponse, LoginRequest, SetLockRequest, SetLockResponse,
    UpsertRequest, UpsertResponse,
};
pub use errors::{ApiError, ApiErrorCode};

pub const CRATE_NAME: &str = "tally-api";

/// Watermark handed to a client that has never synced; every record's
/// `updated_at` compares after it.
pub const EPOCH_WATERMARK: &str = "1970-01-01T00:00:00.000Z";
