#![forbid(unsafe_code)]
//! Reconciliation server: the single server of record the dashboard
//! clients poll. Exposes bootstrap/changes reads and the lock- and
//! version-checked upsert write over HTTP+JSON.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tally_store::SyncStore;
use tokio::sync::Mutex;

mod auth;
mod config;
mod http;

pub use config::ServerConfig;

pub const CRATE_NAME: &str = "tally-server";

/// Shared handler state. The store connection sits behind a tokio mutex;
/// together with the store's IMMEDIATE transactions this serializes the
/// read-check-write of every upsert, so two racing writers with the same
/// expected version can never both win.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<SyncStore>>,
    pub config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: SyncStore, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/login", post(http::handlers::login_handler))
        .route("/api/health", get(http::handlers::health_handler));
    let authed = Router::new()
        .route("/api/bootstrap", get(http::handlers::bootstrap_handler))
        .route("/api/changes", get(http::handlers::changes_handler))
        .route("/api/upsert", post(http::handlers::upsert_handler))
        .route("/api/set-lock", post(http::handlers::set_lock_handler))
        .layer(axum::middleware::from_fn(auth::require_actor));
    public
        .merge(authed)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}
