//! Administrative endpoints: venues, seats, and event materialization.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tixgo_core::NewSeat;

use crate::dto::{
    BatchCreateSeatsRequest, BatchCreateSeatsResponse, CreateEventRequest, CreateEventResponse,
    CreateVenueRequest, CreateVenueResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /admin/venues`.
pub async fn create_venue(
    State(state): State<AppState>,
    Json(request): Json<CreateVenueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("venue name is required"));
    }

    let venue = state
        .services
        .admin
        .create_venue(&request.name, &request.seating_scheme)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVenueResponse { venue_id: venue.id }),
    ))
}

/// `POST /admin/venues/{id}/seats`.
pub async fn batch_create_seats(
    State(state): State<AppState>,
    Path(venue_id): Path<i64>,
    Json(request): Json<BatchCreateSeatsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.seats.is_empty() {
        return Err(ApiError::bad_request("no seats provided"));
    }

    let seats: Vec<NewSeat> = request
        .seats
        .into_iter()
        .map(|seat| NewSeat {
            section: seat.section,
            row: seat.row,
            number: seat.number,
        })
        .collect();

    let created = state
        .services
        .admin
        .batch_create_seats(venue_id, &seats)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BatchCreateSeatsResponse { created }),
    ))
}

/// `POST /admin/events` — create the event and materialize its seats.
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("event title is required"));
    }

    let event_id = state
        .services
        .admin
        .create_event_with_init(
            request.venue_id,
            &request.title,
            request.starts_at,
            request.ends_at,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CreateEventResponse { event_id })))
}
