//! Create-hold: the one endpoint that composes the idempotency protocol,
//! the rate limiter, and the transactional hold.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tixgo_redis::idempotency::DEFAULT_LOCK_TTL;
use tixgo_redis::keys;

use crate::dto::{CreateHoldRequest, CreateHoldResponse};
use crate::error::ApiError;
use crate::state::AppState;

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// `POST /events/{id}/holds`.
///
/// With an `Idempotency-Key` header the request is guarded: a stored result
/// replays byte-identically with 201, a held lock answers 409 with
/// `Retry-After: 1`, and a failed mutation releases the lock so the client
/// can retry immediately.
pub async fn create_hold(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CreateHoldRequest>,
) -> Response {
    let idem_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let storage_key = idem_key
        .as_deref()
        .map(|key| keys::idempotent_hold(event_id, key));

    if let Some(storage_key) = storage_key.as_deref() {
        // Fast path: the client is retrying a finished request.
        match state.idempotency.get_result(storage_key).await {
            Ok(Some(payload)) => return replay_stored(idem_key.as_deref(), payload),
            Ok(None) => {}
            Err(err) => return ApiError::internal(&err).into_response(),
        }

        match state.idempotency.acquire_lock(storage_key, DEFAULT_LOCK_TTL).await {
            Ok(true) => {}
            Ok(false) => {
                // Lost the race; the winner may have finished in between.
                if let Ok(Some(payload)) = state.idempotency.get_result(storage_key).await {
                    return replay_stored(idem_key.as_deref(), payload);
                }
                return ApiError::conflict("idempotency key in progress")
                    .with_retry_after(1)
                    .into_response();
            }
            Err(err) => return ApiError::internal(&err).into_response(),
        }
    }

    let rate_limit_key = format!("ip:{}", addr.ip());
    let outcome = state
        .services
        .reservation
        .create_hold(
            request.user_id,
            event_id,
            &request.seat_ids,
            Duration::from_secs(request.ttl_sec),
            Some(&rate_limit_key),
        )
        .await;

    match outcome {
        Ok(hold_id) => {
            let response = CreateHoldResponse { hold_id };

            if let Some(storage_key) = storage_key.as_deref() {
                match serde_json::to_string(&response) {
                    Ok(payload) => {
                        if let Err(err) = state.idempotency.save_result(storage_key, &payload).await
                        {
                            tracing::warn!(error = %err, "failed to store idempotency result");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to encode idempotency result");
                    }
                }
            }

            let mut http = (StatusCode::CREATED, Json(response)).into_response();
            echo_idempotency_key(&mut http, idem_key.as_deref());
            http
        }
        Err(err) => {
            // Release so the client can retry without waiting out the lock.
            if let Some(storage_key) = storage_key.as_deref() {
                if let Err(release_err) = state.idempotency.release(storage_key).await {
                    tracing::warn!(error = %release_err, "failed to release idempotency lock");
                }
            }
            ApiError::from(err).into_response()
        }
    }
}

fn replay_stored(idem_key: Option<&str>, payload: String) -> Response {
    let mut response = (
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        payload,
    )
        .into_response();
    echo_idempotency_key(&mut response, idem_key);
    response
}

fn echo_idempotency_key(response: &mut Response, idem_key: Option<&str>) {
    if let Some(key) = idem_key {
        if let Ok(value) = HeaderValue::from_str(key) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(IDEMPOTENCY_KEY_HEADER), value);
        }
    }
}
