//! Router assembly.

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, events, health, holds, orders};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Build the complete router: public reads, the reservation writes, and the
/// admin group, wrapped in request-id, CORS, and trace layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        // Public API
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/events/:id/availability", get(events::get_availability))
        .route("/events/:id/seats", get(events::list_event_seats))
        .route("/events/:id/holds", post(holds::create_hold))
        .route("/orders/confirm", post(orders::confirm_order))
        .route("/orders/:id", get(orders::get_order))
        // Admin API
        .route("/admin/venues", post(admin::create_venue))
        .route("/admin/venues/:id/seats", post(admin::batch_create_seats))
        .route("/admin/events", post(admin::create_event))
        .layer(from_fn(request_id))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
