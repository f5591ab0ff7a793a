//! Venue, seat, and event administration.
//!
//! `create_event_with_init` is part of the reservation core: creating the
//! event and materializing its `event_seats` rows must be atomic, and the
//! new event's (empty) cached projections are invalidated after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tixgo_core::{NewSeat, RepoError, Venue};
use tixgo_postgres::{admin, Store};
use tixgo_redis::{Cache, EventsPubSub};

use crate::error::AdminError;

/// Administrative writes.
pub struct AdminService {
    store: Arc<Store>,
    cache: Arc<Cache>,
    pubsub: Arc<EventsPubSub>,
}

impl AdminService {
    /// Wire the service.
    #[must_use]
    pub fn new(store: Arc<Store>, cache: Arc<Cache>, pubsub: Arc<EventsPubSub>) -> Self {
        Self {
            store,
            cache,
            pubsub,
        }
    }

    /// Create a venue, returning the created row.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::VenueConflict`] if the name is taken.
    pub async fn create_venue(
        &self,
        name: &str,
        seating_scheme: &serde_json::Value,
    ) -> Result<Venue, AdminError> {
        let result = self
            .store
            .run_in_tx(move |conn, _hooks| {
                let name = name.to_string();
                let seating_scheme = seating_scheme.clone();
                Box::pin(async move { admin::create_venue(conn, &name, &seating_scheme).await })
            })
            .await;

        match result {
            Ok(venue) => Ok(venue),
            Err(RepoError::Conflict) => Err(AdminError::VenueConflict),
            Err(other) => Err(AdminError::Repo(other)),
        }
    }

    /// Batch-create seats for a venue, returning how many were inserted
    /// (duplicates are skipped).
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::VenueNotFound`] for an unknown venue.
    pub async fn batch_create_seats(
        &self,
        venue_id: i64,
        seats: &[NewSeat],
    ) -> Result<u64, AdminError> {
        let result = self
            .store
            .run_in_tx(move |conn, _hooks| {
                let seats = seats.to_vec();
                Box::pin(async move { admin::batch_create_seats(conn, venue_id, &seats).await })
            })
            .await;

        match result {
            Ok(created) => Ok(created),
            Err(RepoError::NotFound) => Err(AdminError::VenueNotFound),
            Err(RepoError::Conflict) => Err(AdminError::SeatsConflict),
            Err(other) => Err(AdminError::Repo(other)),
        }
    }

    /// Create an event and materialize its seats from the venue in one
    /// transaction, returning the event id.
    ///
    /// # Errors
    ///
    /// - [`AdminError::InvalidSchedule`] unless `starts_at < ends_at`.
    /// - [`AdminError::VenueNotFound`] for an unknown venue.
    /// - [`AdminError::EventConflict`] on a uniqueness violation.
    pub async fn create_event_with_init(
        &self,
        venue_id: i64,
        title: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<i64, AdminError> {
        if ends_at <= starts_at {
            return Err(AdminError::InvalidSchedule);
        }

        let result = self
            .store
            .run_in_tx(move |conn, hooks| {
                let cache = Arc::clone(&self.cache);
                let pubsub = Arc::clone(&self.pubsub);
                let title = title.to_string();
                Box::pin(async move {
                    let event_id =
                        admin::create_event(conn, venue_id, &title, starts_at, ends_at).await?;
                    let seats = admin::init_event_seats(conn, event_id, venue_id).await?;

                    tracing::info!(event_id, venue_id, seats, "event created with seats");

                    hooks.after_commit(async move {
                        crate::invalidate_and_publish(&cache, &pubsub, event_id).await;
                    });
                    Ok(event_id)
                })
            })
            .await;

        match result {
            Ok(event_id) => Ok(event_id),
            Err(RepoError::NotFound) => Err(AdminError::VenueNotFound),
            Err(RepoError::Conflict) => Err(AdminError::EventConflict),
            Err(other) => Err(AdminError::Repo(other)),
        }
    }
}
