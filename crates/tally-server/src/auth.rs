// SPDX-License-Identifier: Apache-2.0

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tally_api::ApiError;

/// The authenticated actor behind a request, as asserted by the
/// `x-actor-id` header. Identity hardening is out of scope; presence of
/// the header is the whole contract, and its absence rejects the request
/// before storage is touched.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

pub async fn require_actor(mut request: Request<Body>, next: Next) -> Response {
    let actor = request
        .headers()
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    match actor {
        Some(id) => {
            request.extensions_mut().insert(Actor(id));
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": ApiError::auth_required()})),
        )
            .into_response(),
    }
}
