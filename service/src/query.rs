//! Cached read views over events, availability, seats, and orders.

use std::sync::Arc;
use std::time::Duration;

use tixgo_core::{Event, EventCounts, RepoError, SeatWithStatus};
use tixgo_postgres::{query, Store};
use tixgo_redis::{keys, Cache};

use crate::error::QueryError;

/// Read-side settings: projection TTLs and pagination bounds.
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    /// TTL of the cached event summary.
    pub event_summary_ttl: Duration,
    /// TTL of the cached availability counters.
    pub availability_ttl: Duration,
    /// Page size when the client does not ask for one.
    pub default_seats_page: i64,
    /// Hard ceiling on the page size.
    pub max_seats_page: i64,
    /// Whether the first default page of the full seat map is cached.
    pub cache_event_seat_map: bool,
    /// TTL of the cached seat map.
    pub event_seat_map_ttl: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            event_summary_ttl: keys::EVENT_SUMMARY_TTL,
            availability_ttl: keys::EVENT_AVAILABILITY_TTL,
            default_seats_page: 100,
            max_seats_page: 500,
            cache_event_seat_map: false,
            event_seat_map_ttl: keys::EVENT_SEAT_MAP_TTL,
        }
    }
}

/// Read service: every hot view goes through the read-through cache, whose
/// keys the write paths invalidate after commit.
pub struct QueryService {
    store: Arc<Store>,
    cache: Arc<Cache>,
    cfg: QueryConfig,
}

impl QueryService {
    /// Wire the service, normalizing nonsensical pagination settings.
    #[must_use]
    pub fn new(store: Arc<Store>, cache: Arc<Cache>, mut cfg: QueryConfig) -> Self {
        let defaults = QueryConfig::default();
        if cfg.default_seats_page <= 0 {
            cfg.default_seats_page = defaults.default_seats_page;
        }
        if cfg.max_seats_page <= 0 {
            cfg.max_seats_page = defaults.max_seats_page;
        }

        Self { store, cache, cfg }
    }

    /// The event summary, read through the 60 s cache.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EventNotFound`] for an unknown id.
    pub async fn get_event(&self, id: i64) -> Result<Event, QueryError> {
        let view = keys::event_summary(id).with_ttl(self.cfg.event_summary_ttl);
        self.cache
            .get_or_load(&view, || async {
                query::get_event(self.store.pool(), id)
                    .await
                    .map_err(|err| match err {
                        RepoError::NotFound => QueryError::EventNotFound,
                        other => QueryError::Repo(other),
                    })
            })
            .await
    }

    /// Availability counters, read through the 15 s cache.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Repo`] on storage failure.
    pub async fn counts_by_status(&self, event_id: i64) -> Result<EventCounts, QueryError> {
        let view = keys::event_availability(event_id).with_ttl(self.cfg.availability_ttl);
        self.cache
            .get_or_load(&view, || async {
                query::counts_by_status(self.store.pool(), event_id)
                    .await
                    .map_err(QueryError::Repo)
            })
            .await
    }

    /// List events ordered by start time.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Repo`] on storage failure.
    pub async fn list_events(
        &self,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Event>, QueryError> {
        let limit = self.clamp_page(limit);
        query::list_events(self.store.pool(), limit, offset.max(0))
            .await
            .map_err(QueryError::Repo)
    }

    /// List an event's seats with their status, paginated.
    ///
    /// The unfiltered first default page optionally reads through the
    /// seat-map cache; every other shape goes straight to the store, since
    /// one key cannot represent arbitrary filter/page combinations.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Repo`] on storage failure.
    pub async fn list_event_seats(
        &self,
        event_id: i64,
        only_available: bool,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<SeatWithStatus>, QueryError> {
        let limit = self.clamp_page(limit);
        let offset = offset.max(0);

        let cacheable = self.cfg.cache_event_seat_map
            && !only_available
            && offset == 0
            && limit == self.cfg.default_seats_page;

        if cacheable {
            let view = keys::event_seat_map(event_id).with_ttl(self.cfg.event_seat_map_ttl);
            return self
                .cache
                .get_or_load(&view, || async {
                    query::list_event_seats(self.store.pool(), event_id, false, limit, offset)
                        .await
                        .map_err(QueryError::Repo)
                })
                .await;
        }

        query::list_event_seats(self.store.pool(), event_id, only_available, limit, offset)
            .await
            .map_err(QueryError::Repo)
    }

    fn clamp_page(&self, limit: Option<i64>) -> i64 {
        match limit {
            Some(limit) if limit > 0 => limit.min(self.cfg.max_seats_page),
            _ => self.cfg.default_seats_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamping_applies_default_and_ceiling() {
        let cfg = QueryConfig::default();
        let clamp = |limit: Option<i64>| match limit {
            Some(limit) if limit > 0 => limit.min(cfg.max_seats_page),
            _ => cfg.default_seats_page,
        };

        assert_eq!(clamp(None), 100);
        assert_eq!(clamp(Some(0)), 100);
        assert_eq!(clamp(Some(-3)), 100);
        assert_eq!(clamp(Some(42)), 42);
        assert_eq!(clamp(Some(10_000)), 500);
    }
}
