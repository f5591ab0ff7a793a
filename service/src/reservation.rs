//! Orchestration of the hold/confirm/cancel/expire state machine.

use std::sync::Arc;
use std::time::Duration;

use tixgo_core::RepoError;
use tixgo_postgres::{query, reservation, Store};
use tixgo_redis::{Cache, EventsPubSub, SlidingWindowLimiter};
use uuid::Uuid;

use crate::error::ReservationError;
use crate::retry::{with_serialization_retry, SERIALIZATION_ATTEMPTS};

/// Bounds on client-requested hold lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct ReservationConfig {
    /// Shortest accepted hold TTL.
    pub min_hold_ttl: Duration,
    /// Longest accepted hold TTL.
    pub max_hold_ttl: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            min_hold_ttl: Duration::from_secs(15),
            max_hold_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// The reservation orchestrator.
///
/// Every mutation follows the same shape: rate-limit gate before the
/// transaction, the state change inside one serializable transaction, cache
/// invalidation and the `event_changed` publish as after-commit hooks.
pub struct ReservationService {
    store: Arc<Store>,
    cache: Arc<Cache>,
    pubsub: Arc<EventsPubSub>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    cfg: ReservationConfig,
}

impl ReservationService {
    /// Wire the service; `limiter` is optional so internal callers can skip
    /// admission control.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        cache: Arc<Cache>,
        pubsub: Arc<EventsPubSub>,
        limiter: Option<Arc<SlidingWindowLimiter>>,
        mut cfg: ReservationConfig,
    ) -> Self {
        let defaults = ReservationConfig::default();
        if cfg.min_hold_ttl.is_zero() {
            cfg.min_hold_ttl = defaults.min_hold_ttl;
        }
        if cfg.max_hold_ttl.is_zero() || cfg.max_hold_ttl < cfg.min_hold_ttl {
            cfg.max_hold_ttl = defaults.max_hold_ttl;
        }

        Self {
            store,
            cache,
            pubsub,
            limiter,
            cfg,
        }
    }

    /// Claim `seat_ids` on `event_id` for `user_id`, returning the hold id.
    ///
    /// The TTL is clamped into the configured bounds. When a rate-limit key
    /// is supplied the sliding window is consulted first; a denial carries
    /// the retry-after duration and never starts a transaction.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NoSeatsSelected`] on an empty seat list.
    /// - [`ReservationError::RateLimited`] when the window is full.
    /// - [`ReservationError::SeatsUnavailable`] when the hold raced.
    pub async fn create_hold(
        &self,
        user_id: i64,
        event_id: i64,
        seat_ids: &[i64],
        ttl: Duration,
        rate_limit_key: Option<&str>,
    ) -> Result<Uuid, ReservationError> {
        if seat_ids.is_empty() {
            return Err(ReservationError::NoSeatsSelected);
        }

        let ttl = self.clamp_ttl(ttl);

        if let (Some(limiter), Some(suffix)) = (self.limiter.as_deref(), rate_limit_key) {
            let decision = limiter.allow(suffix).await?;
            if !decision.allowed {
                return Err(ReservationError::RateLimited {
                    retry_after: decision.retry_after,
                });
            }
        }

        let result = with_serialization_retry(SERIALIZATION_ATTEMPTS, || {
            self.store.run_in_tx(move |conn, hooks| {
                let cache = Arc::clone(&self.cache);
                let pubsub = Arc::clone(&self.pubsub);
                let seat_ids = seat_ids.to_vec();
                Box::pin(async move {
                    let hold_id =
                        reservation::hold_seats(conn, event_id, user_id, &seat_ids, ttl).await?;
                    hooks.after_commit(async move {
                        crate::invalidate_and_publish(&cache, &pubsub, event_id).await;
                    });
                    Ok(hold_id)
                })
            })
        })
        .await;

        match result {
            Ok(hold_id) => {
                tracing::info!(
                    event_id,
                    user_id,
                    hold_id = %hold_id,
                    seats = seat_ids.len(),
                    ttl_secs = ttl.as_secs(),
                    "hold created"
                );
                Ok(hold_id)
            }
            Err(RepoError::SeatsUnavailable) => Err(ReservationError::SeatsUnavailable),
            Err(RepoError::Conflict | RepoError::Serialization) => {
                Err(ReservationError::HoldConflict)
            }
            Err(other) => Err(ReservationError::Repo(other)),
        }
    }

    /// Confirm a hold into an order, returning `(order_id, event_id)`.
    ///
    /// Every seat still held under the hold becomes `sold` with exactly one
    /// ticket; an empty set surfaces as expired.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidTotal`] unless `total_cents > 0`.
    /// - [`ReservationError::HoldNotFound`] for an unknown hold id.
    /// - [`ReservationError::HoldExpired`] when the claim lapsed.
    /// - [`ReservationError::HoldConflict`] when a concurrent writer won.
    pub async fn confirm(
        &self,
        hold_id: Uuid,
        total_cents: i64,
    ) -> Result<(Uuid, i64), ReservationError> {
        if total_cents <= 0 {
            return Err(ReservationError::InvalidTotal);
        }

        let result = with_serialization_retry(SERIALIZATION_ATTEMPTS, || {
            self.store.run_in_tx(move |conn, hooks| {
                let cache = Arc::clone(&self.cache);
                let pubsub = Arc::clone(&self.pubsub);
                Box::pin(async move {
                    let event_id = query::get_hold(&mut *conn, hold_id).await?.event_id;
                    let order_id = reservation::confirm_hold(conn, hold_id, total_cents).await?;
                    hooks.after_commit(async move {
                        crate::invalidate_and_publish(&cache, &pubsub, event_id).await;
                    });
                    Ok((order_id, event_id))
                })
            })
        })
        .await;

        match result {
            Ok((order_id, event_id)) => {
                tracing::info!(hold_id = %hold_id, order_id = %order_id, event_id, "hold confirmed");
                Ok((order_id, event_id))
            }
            Err(RepoError::NotFound) => Err(ReservationError::HoldNotFound),
            Err(RepoError::HoldExpired | RepoError::NothingToConfirm) => {
                Err(ReservationError::HoldExpired)
            }
            Err(RepoError::Conflict | RepoError::Serialization) => {
                Err(ReservationError::HoldConflict)
            }
            Err(other) => Err(ReservationError::Repo(other)),
        }
    }

    /// Cancel a hold, releasing its seats. Returns the event id.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::HoldNotFound`] for an unknown hold id.
    pub async fn cancel(&self, hold_id: Uuid) -> Result<i64, ReservationError> {
        let result = with_serialization_retry(SERIALIZATION_ATTEMPTS, || {
            self.store.run_in_tx(move |conn, hooks| {
                let cache = Arc::clone(&self.cache);
                let pubsub = Arc::clone(&self.pubsub);
                Box::pin(async move {
                    let event_id = query::get_hold(&mut *conn, hold_id).await?.event_id;
                    reservation::cancel_hold(conn, hold_id).await?;
                    hooks.after_commit(async move {
                        crate::invalidate_and_publish(&cache, &pubsub, event_id).await;
                    });
                    Ok(event_id)
                })
            })
        })
        .await;

        match result {
            Ok(event_id) => {
                tracing::info!(hold_id = %hold_id, event_id, "hold cancelled");
                Ok(event_id)
            }
            Err(RepoError::NotFound) => Err(ReservationError::HoldNotFound),
            Err(RepoError::Serialization) => Err(ReservationError::HoldConflict),
            Err(other) => Err(ReservationError::Repo(other)),
        }
    }

    /// Sweep expired holds across all events, returning the number of seats
    /// released.
    ///
    /// Deliberately does not publish `event_changed`: expiry is bounded-lag
    /// and availability consumers tolerate up to one TTL of staleness; the
    /// next write emits a change event anyway.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Repo`] on storage failure.
    pub async fn expire(&self) -> Result<u64, ReservationError> {
        let mut conn = self.store.acquire().await.map_err(ReservationError::Repo)?;
        let released = reservation::expire_holds(&mut *conn)
            .await
            .map_err(ReservationError::Repo)?;

        if released > 0 {
            tracing::info!(released, "expired holds reclaimed");
        }

        Ok(released)
    }

    fn clamp_ttl(&self, ttl: Duration) -> Duration {
        ttl.clamp(self.cfg.min_hold_ttl, self.cfg.max_hold_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u64, max: u64) -> ReservationConfig {
        ReservationConfig {
            min_hold_ttl: Duration::from_secs(min),
            max_hold_ttl: Duration::from_secs(max),
        }
    }

    #[test]
    fn default_ttl_bounds_match_the_protocol() {
        let cfg = ReservationConfig::default();
        assert_eq!(cfg.min_hold_ttl, Duration::from_secs(15));
        assert_eq!(cfg.max_hold_ttl, Duration::from_secs(300));
    }

    #[test]
    fn ttl_clamps_into_bounds() {
        let cfg = config(15, 300);
        let clamp = |ttl: u64| Duration::from_secs(ttl).clamp(cfg.min_hold_ttl, cfg.max_hold_ttl);

        assert_eq!(clamp(0), Duration::from_secs(15));
        assert_eq!(clamp(60), Duration::from_secs(60));
        assert_eq!(clamp(3600), Duration::from_secs(300));
    }
}
