//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /events/{id}/holds`.
#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    /// User creating the hold.
    pub user_id: i64,
    /// Seats to claim; must be non-empty.
    pub seat_ids: Vec<i64>,
    /// Requested hold lifetime in seconds; clamped server-side.
    #[serde(default)]
    pub ttl_sec: u64,
}

/// Response of a successful create-hold.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateHoldResponse {
    /// The created hold id.
    pub hold_id: Uuid,
}

/// Body of `POST /orders/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    /// Hold to confirm.
    pub hold_id: Uuid,
    /// Order total in minor currency units; must be positive.
    pub total_cents: i64,
}

/// Response of a successful confirm.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmOrderResponse {
    /// The created order id.
    pub order_id: Uuid,
    /// Event the order is for.
    pub event_id: i64,
}

/// Body of `POST /admin/venues`.
#[derive(Debug, Deserialize)]
pub struct CreateVenueRequest {
    /// Unique venue name.
    pub name: String,
    /// Opaque seating-scheme blob.
    #[serde(default)]
    pub seating_scheme: serde_json::Value,
}

/// Response of a successful create-venue.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVenueResponse {
    /// The created venue id.
    pub venue_id: i64,
}

/// One seat position in a batch-create request.
#[derive(Debug, Deserialize)]
pub struct SeatInput {
    /// Section label.
    pub section: String,
    /// Row within the section.
    pub row: i32,
    /// Seat number within the row.
    pub number: i32,
}

/// Body of `POST /admin/venues/{id}/seats`.
#[derive(Debug, Deserialize)]
pub struct BatchCreateSeatsRequest {
    /// Seats to create; duplicates are skipped.
    pub seats: Vec<SeatInput>,
}

/// Response of a successful batch-create.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchCreateSeatsResponse {
    /// How many seats were actually inserted.
    pub created: u64,
}

/// Body of `POST /admin/events`.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Venue to materialize seats from.
    pub venue_id: i64,
    /// Event title.
    pub title: String,
    /// Start instant (RFC 3339).
    pub starts_at: DateTime<Utc>,
    /// End instant (RFC 3339); must be after the start.
    pub ends_at: DateTime<Utc>,
}

/// Response of a successful create-event.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEventResponse {
    /// The created event id.
    pub event_id: i64,
}

/// Query string of `GET /events/{id}/seats`.
#[derive(Debug, Default, Deserialize)]
pub struct SeatsQuery {
    /// `only=available` narrows to free seats.
    pub only: Option<String>,
    /// Alternative spelling accepted for compatibility.
    pub only_available: Option<bool>,
    /// Page size; defaults to 100, capped at 500.
    pub limit: Option<i64>,
    /// Page offset.
    pub offset: Option<i64>,
}

impl SeatsQuery {
    /// Whether the client asked for available seats only.
    #[must_use]
    pub fn wants_only_available(&self) -> bool {
        self.only.as_deref() == Some("available") || self.only_available == Some(true)
    }
}

/// Query string of `GET /events`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Page size.
    pub limit: Option<i64>,
    /// Page offset.
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_hold_request_defaults_ttl_to_zero() {
        let req: CreateHoldRequest =
            serde_json::from_str(r#"{"user_id":7,"seat_ids":[10,11]}"#).unwrap();
        assert_eq!(req.user_id, 7);
        assert_eq!(req.seat_ids, vec![10, 11]);
        assert_eq!(req.ttl_sec, 0);
    }

    #[test]
    fn confirm_request_rejects_a_malformed_hold_id() {
        let result = serde_json::from_str::<ConfirmOrderRequest>(
            r#"{"hold_id":"not-a-uuid","total_cents":500}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn create_event_request_parses_rfc3339() {
        let req: CreateEventRequest = serde_json::from_str(
            r#"{
                "venue_id": 3,
                "title": "Opening Night",
                "starts_at": "2026-09-01T19:00:00Z",
                "ends_at": "2026-09-01T22:00:00Z"
            }"#,
        )
        .unwrap();
        assert!(req.starts_at < req.ends_at);
    }

    #[test]
    fn seats_query_accepts_both_spellings() {
        let q: SeatsQuery = serde_json::from_str(r#"{"only":"available"}"#).unwrap();
        assert!(q.wants_only_available());

        let q: SeatsQuery = serde_json::from_str(r#"{"only_available":true}"#).unwrap();
        assert!(q.wants_only_available());

        let q = SeatsQuery::default();
        assert!(!q.wants_only_available());
    }

    #[test]
    fn hold_response_wire_shape() {
        let resp = CreateHoldResponse {
            hold_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hold_id"], "00000000-0000-0000-0000-000000000000");
    }
}
