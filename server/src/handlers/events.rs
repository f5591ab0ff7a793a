//! Public event read endpoints, served through the read-through cache with
//! conditional responses.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::dto::{ListQuery, SeatsQuery};
use crate::error::ApiError;
use crate::etag::respond_with_cache;
use crate::state::AppState;

/// `GET /events/{id}` — cached event summary; 60 s client cache.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let event = state.services.query.get_event(event_id).await?;
    Ok(respond_with_cache(&headers, &event, "public, max-age=60"))
}

/// `GET /events/{id}/availability` — cached counters; 15 s client cache.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let counts = state.services.query.counts_by_status(event_id).await?;
    Ok(respond_with_cache(&headers, &counts, "public, max-age=15"))
}

/// `GET /events/{id}/seats?only=available&limit=&offset=` — paginated seat
/// listing.
pub async fn list_event_seats(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Query(query): Query<SeatsQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let seats = state
        .services
        .query
        .list_event_seats(
            event_id,
            query.wants_only_available(),
            query.limit,
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(respond_with_cache(&headers, &seats, "public, max-age=15"))
}

/// `GET /events?limit=&offset=` — events ordered by start time.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let events = state
        .services
        .query
        .list_events(query.limit, query.offset.unwrap_or(0))
        .await?;
    Ok(respond_with_cache(&headers, &events, "public, max-age=15"))
}
