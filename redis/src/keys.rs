//! The `tixgo:v1` key namespace.
//!
//! Cached projections are declared as a [`TypedKey`]: the key string, the
//! decoded value type, and the TTL travel together, so a call site cannot
//! pair a key with the wrong type or TTL.

use std::marker::PhantomData;
use std::time::Duration;

use tixgo_core::{Event, EventCounts, SeatWithStatus};

/// Version-scoped namespace prefix for every key and channel.
pub const NAMESPACE: &str = "tixgo:v1";

/// Default TTL of the event summary projection.
pub const EVENT_SUMMARY_TTL: Duration = Duration::from_secs(60);
/// Default TTL of the availability counters projection.
pub const EVENT_AVAILABILITY_TTL: Duration = Duration::from_secs(15);
/// Default TTL of the seat-map projection.
pub const EVENT_SEAT_MAP_TTL: Duration = Duration::from_secs(60);

/// A cache key bound to the type it decodes to and the TTL it is written
/// with.
#[derive(Debug, Clone)]
pub struct TypedKey<T> {
    key: String,
    ttl: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    /// Bind a raw key string to a value type and TTL.
    #[must_use]
    pub const fn new(key: String, ttl: Duration) -> Self {
        Self {
            key,
            ttl,
            _value: PhantomData,
        }
    }

    /// The raw key string.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The write TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the TTL, e.g. from service configuration.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cached event summary for one event.
#[must_use]
pub fn event_summary(event_id: i64) -> TypedKey<Event> {
    TypedKey::new(
        format!("{NAMESPACE}:event:{event_id}:summary"),
        EVENT_SUMMARY_TTL,
    )
}

/// Cached availability counters for one event.
#[must_use]
pub fn event_availability(event_id: i64) -> TypedKey<EventCounts> {
    TypedKey::new(
        format!("{NAMESPACE}:event:{event_id}:availability"),
        EVENT_AVAILABILITY_TTL,
    )
}

/// Cached seat map for one event.
#[must_use]
pub fn event_seat_map(event_id: i64) -> TypedKey<Vec<SeatWithStatus>> {
    TypedKey::new(
        format!("{NAMESPACE}:event:{event_id}:seatmap"),
        EVENT_SEAT_MAP_TTL,
    )
}

/// The three raw keys [`crate::Cache::invalidate_event`] deletes.
#[must_use]
pub fn event_keys(event_id: i64) -> [String; 3] {
    [
        event_summary(event_id).key,
        event_availability(event_id).key,
        event_seat_map(event_id).key,
    ]
}

/// Prefix for the sliding-window rate limiter keys.
#[must_use]
pub fn rate_limit_prefix() -> String {
    format!("{NAMESPACE}:rl")
}

/// Storage key guarding an idempotent create-hold request; scoped by route
/// resource and the client-provided key.
#[must_use]
pub fn idempotent_hold(event_id: i64, client_key: &str) -> String {
    format!("{NAMESPACE}:idem:holds:{event_id}:{client_key}")
}

/// The single pub/sub channel announcing event changes.
#[must_use]
pub fn events_changed_channel() -> String {
    format!("{NAMESPACE}:events:changed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespace_versioned() {
        assert_eq!(event_summary(42).key(), "tixgo:v1:event:42:summary");
        assert_eq!(
            event_availability(42).key(),
            "tixgo:v1:event:42:availability"
        );
        assert_eq!(event_seat_map(42).key(), "tixgo:v1:event:42:seatmap");
        assert_eq!(idempotent_hold(7, "abc"), "tixgo:v1:idem:holds:7:abc");
        assert_eq!(events_changed_channel(), "tixgo:v1:events:changed");
    }

    #[test]
    fn invalidation_covers_every_projection_key() {
        let keys = event_keys(9);
        assert!(keys.contains(&event_summary(9).key().to_string()));
        assert!(keys.contains(&event_availability(9).key().to_string()));
        assert!(keys.contains(&event_seat_map(9).key().to_string()));
    }

    #[test]
    fn ttl_override_keeps_the_key() {
        let view = event_summary(1).with_ttl(Duration::from_secs(5));
        assert_eq!(view.ttl(), Duration::from_secs(5));
        assert_eq!(view.key(), "tixgo:v1:event:1:summary");
    }
}
