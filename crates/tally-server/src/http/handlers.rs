// SPDX-License-Identifier: Apache-2.0

use crate::auth::Actor;
use crate::AppState;
use axum::async_trait;
use axum::extract::{Extension, FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tally_api::{
    ApiError, ApiErrorCode, BootstrapResponse, ChangesResponse, LoginRequest, SetLockRequest,
    SetLockResponse, UpsertRequest, UpsertResponse, EPOCH_WATERMARK,
};
use tally_store::{now_rfc3339, StoreError, UpsertOutcome};
use tracing::{info, warn};

pub(crate) fn api_error_response(status: StatusCode, err: ApiError) -> Response {
    (status, Json(json!({"error": err}))).into_response()
}

/// JSON body extractor that reports malformed input as `invalid_request`.
/// Domain newtypes validate during deserialization, so this is where a
/// padded or garbage period key or record id is rejected — before any
/// handler or the store sees it.
pub(crate) struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(api_error_response(
                StatusCode::BAD_REQUEST,
                ApiError::new(
                    ApiErrorCode::InvalidRequest,
                    rejection.body_text(),
                    json!({}),
                ),
            )),
        }
    }
}

fn internal_error(context: &str, err: &StoreError) -> Response {
    warn!(context, error = %err, "storage failure");
    api_error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiError::new(ApiErrorCode::Internal, "storage failure", json!({})),
    )
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "online"}))
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Response {
    let store = state.store.lock().await;
    match store.verify_login(&req.username, &req.pin) {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "login accepted");
            Json(user).into_response()
        }
        Ok(None) => api_error_response(
            StatusCode::UNAUTHORIZED,
            ApiError::new(
                ApiErrorCode::InvalidCredentials,
                "unknown user or wrong PIN",
                json!({}),
            ),
        ),
        Err(err) => internal_error("login", &err),
    }
}

pub(crate) async fn bootstrap_handler(State(state): State<AppState>) -> Response {
    let store = state.store.lock().await;
    match store.bootstrap() {
        Ok((periods, users)) => Json(BootstrapResponse { periods, users }).into_response(),
        Err(err) => internal_error("bootstrap", &err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangesParams {
    #[serde(default)]
    since: Option<String>,
}

pub(crate) async fn changes_handler(
    State(state): State<AppState>,
    Query(params): Query<ChangesParams>,
) -> Response {
    // Stamp the watermark before querying: a write that lands while the
    // tables are being read is then covered by the next poll instead of
    // falling into the gap between query and response.
    let watermark = now_rfc3339();
    let since = params.since.unwrap_or_else(|| EPOCH_WATERMARK.to_string());
    let store = state.store.lock().await;
    match store.changes_since(&since) {
        Ok(tables) => Json(ChangesResponse { watermark, tables }).into_response(),
        Err(err) => internal_error("changes", &err),
    }
}

pub(crate) async fn upsert_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<UpsertRequest>,
) -> Response {
    let mut store = state.store.lock().await;
    match store.upsert(req.entity, &req.record, &actor.0) {
        Ok(UpsertOutcome::Accepted(stored)) => {
            info!(
                entity = %req.entity,
                id = %stored.id,
                version = stored.version,
                actor = %actor.0,
                "upsert accepted"
            );
            Json(UpsertResponse {
                status: "success".to_string(),
                version: stored.version,
            })
            .into_response()
        }
        Ok(UpsertOutcome::Conflict(server_record)) => {
            info!(entity = %req.entity, id = %req.record.id, "version conflict");
            api_error_response(StatusCode::CONFLICT, ApiError::conflict(&server_record))
        }
        Ok(UpsertOutcome::PeriodLocked(period)) => {
            info!(entity = %req.entity, period = %period, "write rejected: period locked");
            api_error_response(
                StatusCode::FORBIDDEN,
                ApiError::period_locked(period.as_str()),
            )
        }
        Err(StoreError::ExpectedMissing { id, expected }) => api_error_response(
            StatusCode::BAD_REQUEST,
            ApiError::new(
                ApiErrorCode::InvalidRequest,
                format!("record {id} does not exist; expected version must be 0, got {expected}"),
                json!({"id": id, "expected": expected}),
            ),
        ),
        Err(err) => internal_error("upsert", &err),
    }
}

pub(crate) async fn set_lock_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<SetLockRequest>,
) -> Response {
    let mut store = state.store.lock().await;
    match store.set_lock(&req.period, req.lock, &actor.0, req.reason.as_deref()) {
        Ok(lock) => {
            info!(period = %lock.period, locked = lock.is_locked, actor = %actor.0, "lock updated");
            Json(SetLockResponse {
                status: if lock.is_locked { "locked" } else { "unlocked" }.to_string(),
                period: lock.period,
            })
            .into_response()
        }
        Err(err) => internal_error("set-lock", &err),
    }
}
