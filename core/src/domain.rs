//! Domain entities of the reservation pipeline.
//!
//! `event_seats` rows (represented here only through [`SeatWithStatus`] and
//! [`EventCounts`]) are the arbiter of truth for per-seat state; everything
//! else is either admin-owned reference data or the durable output of a
//! confirmed hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live status of a seat within one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    /// Free to be claimed by a hold.
    Available,
    /// Exclusively claimed by a live hold.
    Held,
    /// A ticket exists for this seat; terminal.
    Sold,
}

impl SeatStatus {
    /// The lowercase database/API representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Held => "held",
            Self::Sold => "sold",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "held" => Ok(Self::Held),
            "sold" => Ok(Self::Sold),
            other => Err(format!("unknown seat status: {other}")),
        }
    }
}

/// A place that hosts events. The name is unique and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    /// Stable identifier.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// Opaque seating-scheme blob, stored as raw JSON.
    pub seating_scheme: serde_json::Value,
}

/// A scheduled happening at a venue. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier.
    pub id: i64,
    /// Venue the event takes place at.
    pub venue_id: i64,
    /// Event title.
    pub title: String,
    /// Start instant; strictly before `ends_at`.
    pub starts_at: DateTime<Utc>,
    /// End instant.
    pub ends_at: DateTime<Utc>,
}

/// A physical seat within a venue, unique per (venue, section, row, number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    /// Stable identifier.
    pub id: i64,
    /// Owning venue.
    pub venue_id: i64,
    /// Section label.
    pub section: String,
    /// Row within the section.
    pub row: i32,
    /// Seat number within the row.
    pub number: i32,
}

/// Seat attributes for batch creation, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeat {
    /// Section label.
    pub section: String,
    /// Row within the section.
    pub row: i32,
    /// Seat number within the row.
    pub number: i32,
}

/// A seat joined with its live status for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatWithStatus {
    /// The venue seat.
    #[serde(flatten)]
    pub seat: Seat,
    /// Current per-event status.
    pub status: SeatStatus,
}

/// Availability counters for one event, grouped by seat status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    /// Seats free to hold.
    pub available: i64,
    /// Seats under a live hold.
    pub held: i64,
    /// Seats with a ticket.
    pub sold: i64,
    /// Sum of the three buckets.
    pub total: i64,
}

/// A short-lived exclusive claim on a set of seats for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    /// Random, collision-resistant identifier.
    pub id: Uuid,
    /// Event the held seats belong to.
    pub event_id: i64,
    /// User who created the hold.
    pub user_id: i64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Instant after which the held seats are semantically available again.
    pub expires_at: DateTime<Utc>,
}

/// A durable, paid order produced by confirming a hold. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Opaque identifier.
    pub id: Uuid,
    /// Event the order is for.
    pub event_id: i64,
    /// Purchasing user.
    pub user_id: i64,
    /// Total in integer minor currency units; strictly positive.
    pub total_cents: i64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// One sold seat. `(event_id, seat_id)` is globally unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque identifier.
    pub id: Uuid,
    /// Order this ticket belongs to.
    pub order_id: Uuid,
    /// Event the seat is sold for.
    pub event_id: i64,
    /// The sold seat.
    pub seat_id: i64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// An order together with all of its tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithTickets {
    /// The order.
    pub order: Order,
    /// One ticket per sold seat, in creation order.
    pub tickets: Vec<Ticket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_status_round_trips_through_lowercase() {
        for status in [SeatStatus::Available, SeatStatus::Held, SeatStatus::Sold] {
            let parsed: SeatStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("reserved".parse::<SeatStatus>().is_err());
    }

    #[test]
    fn seat_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SeatStatus::Available).unwrap(),
            "\"available\""
        );
    }

    #[test]
    fn hold_round_trips_through_json() {
        let hold = Hold {
            id: Uuid::new_v4(),
            event_id: 1,
            user_id: 7,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::seconds(60),
        };
        let back: Hold = serde_json::from_str(&serde_json::to_string(&hold).unwrap()).unwrap();
        assert_eq!(back.id, hold.id);
        assert_eq!(back.expires_at, hold.expires_at);
    }

    #[test]
    fn seat_with_status_flattens_seat_fields() {
        let sws = SeatWithStatus {
            seat: Seat {
                id: 7,
                venue_id: 1,
                section: "A".to_string(),
                row: 2,
                number: 3,
            },
            status: SeatStatus::Held,
        };
        let json = serde_json::to_value(&sws).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["section"], "A");
        assert_eq!(json["status"], "held");
    }
}
