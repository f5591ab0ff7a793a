//! Service layer of the TixGo reservation core.
//!
//! Each service orchestrates the Postgres store and the Redis collaborators:
//! rate limiting happens before the transaction, the mutation runs inside
//! one serializable transaction, and cache invalidation plus the
//! `event_changed` publish run as after-commit hooks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use tixgo_postgres::Store;
use tixgo_redis::{Cache, EventsPubSub, SlidingWindowLimiter};

pub mod admin;
pub mod error;
pub mod orders;
pub mod query;
pub mod reservation;
mod retry;

pub use admin::AdminService;
pub use error::{AdminError, OrdersError, QueryError, ReservationError};
pub use orders::OrdersService;
pub use query::{QueryConfig, QueryService};
pub use reservation::{ReservationConfig, ReservationService};

/// Configuration for all services.
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    /// Reservation service settings.
    pub reservation: ReservationConfig,
    /// Query service settings.
    pub query: QueryConfig,
}

/// The assembled service layer.
pub struct Services {
    /// Hold/confirm/cancel/expire orchestration.
    pub reservation: ReservationService,
    /// Cached read views.
    pub query: QueryService,
    /// Venue/seat/event materialization.
    pub admin: AdminService,
    /// Order lookups.
    pub orders: OrdersService,
}

impl Services {
    /// Wire every service onto the shared store and Redis collaborators.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        cache: Arc<Cache>,
        pubsub: Arc<EventsPubSub>,
        limiter: Option<Arc<SlidingWindowLimiter>>,
        cfg: ServicesConfig,
    ) -> Self {
        Self {
            reservation: ReservationService::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&pubsub),
                limiter,
                cfg.reservation,
            ),
            query: QueryService::new(Arc::clone(&store), Arc::clone(&cache), cfg.query),
            admin: AdminService::new(Arc::clone(&store), cache, pubsub),
            orders: OrdersService::new(store),
        }
    }
}

/// The after-commit side effect every event mutation registers: drop the
/// event's cached projections, then announce the change. Failures are logged
/// and swallowed so they cannot undo the committed transaction.
pub(crate) async fn invalidate_and_publish(cache: &Cache, pubsub: &EventsPubSub, event_id: i64) {
    if let Err(err) = cache.invalidate_event(event_id).await {
        tracing::warn!(event_id, error = %err, "post-commit cache invalidation failed");
    }
    if let Err(err) = pubsub.publish_event_changed(event_id).await {
        tracing::warn!(event_id, error = %err, "post-commit event publish failed");
    }
}
