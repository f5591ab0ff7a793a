//! Order confirmation and lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tixgo_core::OrderWithTickets;
use uuid::Uuid;

use crate::dto::{ConfirmOrderRequest, ConfirmOrderResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /orders/confirm` — turn a live hold into an order with tickets.
pub async fn confirm_order(
    State(state): State<AppState>,
    Json(request): Json<ConfirmOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (order_id, event_id) = state
        .services
        .reservation
        .confirm(request.hold_id, request.total_cents)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConfirmOrderResponse { order_id, event_id }),
    ))
}

/// `GET /orders/{id}` — an order with its tickets.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderWithTickets>, ApiError> {
    let order_id =
        Uuid::parse_str(&order_id).map_err(|_| ApiError::bad_request("invalid order id"))?;

    let order = state.services.orders.get_order_with_tickets(order_id).await?;
    Ok(Json(order))
}
