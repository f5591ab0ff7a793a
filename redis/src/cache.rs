//! Read-through cache with in-process single-flight.
//!
//! Values are UTF-8 JSON strings under versioned keys (see [`crate::keys`]).
//! Concurrent misses on one key coalesce onto a single loader run; every
//! waiter receives the leader's outcome from the flight slot — the encoded
//! payload on success (even when the cache write itself failed), or the
//! leader's failure as [`CacheError::FlightFailed`]. The guard is per-process
//! only — it does not coordinate across processes, so a cross-process
//! thundering herd remains possible and is bounded by the short TTLs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::keys::{self, TypedKey};
use crate::CacheError;

/// What the single flight for a key concluded, shared with its waiters.
enum FlightOutcome {
    /// The loader succeeded; the encoded payload for waiters to decode.
    Loaded(String),
    /// The loader (or encoding) failed; the leader's error text.
    Failed(String),
}

type FlightSlot = Arc<tokio::sync::Mutex<Option<FlightOutcome>>>;

/// Redis-backed read-through cache.
pub struct Cache {
    conn: ConnectionManager,
    flights: Mutex<HashMap<String, FlightSlot>>,
}

impl Cache {
    /// Wrap a managed connection.
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Read a raw string value; `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Write a raw string value with a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete keys; a no-op for an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn del(&self, del_keys: &[String]) -> Result<(), CacheError> {
        if del_keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(del_keys).await?;
        Ok(())
    }

    /// Read and decode a JSON value; `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encode`] if the stored value does not decode.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value with a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Encode`] if the value does not serialize.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value)?;
        self.set_raw(key, &encoded, ttl).await
    }

    /// Read-through: return the cached value, or coalesce concurrent misses
    /// onto one `loader` run whose result is written back with the view's
    /// TTL.
    ///
    /// Exactly one caller per key runs the loader; everyone already queued
    /// behind it receives that run's outcome — the value, or the failure as
    /// [`CacheError::FlightFailed`]. Cache-write failures are logged and
    /// swallowed; the loaded value is still returned. Loader failures are
    /// never cached, so the next fresh miss retries.
    ///
    /// # Errors
    ///
    /// Propagates decode failures (as `E: From<CacheError>`) and whatever
    /// the loader returns.
    pub async fn get_or_load<T, E, F, Fut>(&self, view: &TypedKey<T>, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError> + std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = view.key();

        if let Some(found) = self.get_json::<T>(key).await.map_err(E::from)? {
            metrics::counter!("cache.read.total", "result" => "hit").increment(1);
            return Ok(found);
        }
        metrics::counter!("cache.read.total", "result" => "miss").increment(1);

        let flight = self.flight(key);
        let mut slot = flight.lock().await;

        if let Some(outcome) = slot.as_ref() {
            // A leader finished while we waited; share its outcome.
            return match outcome {
                FlightOutcome::Loaded(encoded) => {
                    serde_json::from_str(encoded).map_err(|e| E::from(CacheError::Encode(e)))
                }
                FlightOutcome::Failed(message) => {
                    Err(E::from(CacheError::FlightFailed(message.clone())))
                }
            };
        }

        // Another process may have filled the shared cache in the meantime.
        if let Some(found) = self.get_json::<T>(key).await.map_err(E::from)? {
            return Ok(found);
        }

        let value = match loader().await {
            Ok(value) => value,
            Err(err) => {
                *slot = Some(FlightOutcome::Failed(err.to_string()));
                drop(slot);
                self.clear_flight(key);
                return Err(err);
            }
        };

        let encoded = match serde_json::to_string(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                *slot = Some(FlightOutcome::Failed(err.to_string()));
                drop(slot);
                self.clear_flight(key);
                return Err(E::from(CacheError::Encode(err)));
            }
        };

        if let Err(err) = self.set_raw(key, &encoded, view.ttl()).await {
            tracing::warn!(key, error = %err, "cache write failed, serving uncached");
        }

        *slot = Some(FlightOutcome::Loaded(encoded));
        drop(slot);
        self.clear_flight(key);

        Ok(value)
    }

    /// Atomically delete the summary, availability, and seat-map keys for an
    /// event. Every committed mutation of the event calls this from its
    /// after-commit hook.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn invalidate_event(&self, event_id: i64) -> Result<(), CacheError> {
        self.del(&keys::event_keys(event_id)).await
    }

    fn flight(&self, key: &str) -> FlightSlot {
        let mut flights = self
            .flights
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    fn clear_flight(&self, key: &str) {
        let mut flights = self
            .flights
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        flights.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Live-Redis tests; run with a local server:
    // docker run -d -p 6379:6379 redis:7-alpine

    async fn test_cache() -> Cache {
        let (_client, manager) = crate::connect("redis://127.0.0.1:6379")
            .await
            .expect("redis not reachable");
        Cache::new(manager)
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn get_or_load_populates_and_hits() {
        let cache = test_cache().await;
        let key = format!("tixgo:test:{}", uuid::Uuid::new_v4());
        let view = TypedKey::<i64>::new(key.clone(), Duration::from_secs(30));
        let calls = AtomicUsize::new(0);

        let first: Result<i64, CacheError> = cache
            .get_or_load(&view, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(41)
            })
            .await;
        assert_eq!(first.unwrap(), 41);

        let second: Result<i64, CacheError> = cache
            .get_or_load(&view, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .await;
        assert_eq!(second.unwrap(), 41, "second read must come from cache");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.del(&[key]).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn concurrent_misses_run_the_loader_once() {
        let cache = Arc::new(test_cache().await);
        let key = format!("tixgo:test:{}", uuid::Uuid::new_v4());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let view = TypedKey::<i64>::new(key.clone(), Duration::from_secs(30));
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_load::<i64, CacheError, _, _>(&view, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
                    .unwrap()
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "loader must run once");

        cache.del(&[key]).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn concurrent_failure_is_shared_with_waiters() {
        let cache = Arc::new(test_cache().await);
        let key = format!("tixgo:test:{}", uuid::Uuid::new_v4());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let view = TypedKey::<i64>::new(key.clone(), Duration::from_secs(30));
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_load::<i64, CacheError, _, _>(&view, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err(CacheError::Encode(
                            serde_json::from_str::<i64>("x").unwrap_err(),
                        ))
                    })
                    .await
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().is_err(), "every waiter shares the failure");
        }
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "the loader must run once for the whole flight"
        );

        cache.del(&[key]).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn loader_failure_is_not_cached() {
        let cache = test_cache().await;
        let key = format!("tixgo:test:{}", uuid::Uuid::new_v4());
        let view = TypedKey::<i64>::new(key.clone(), Duration::from_secs(30));

        let failed: Result<i64, CacheError> = cache
            .get_or_load(&view, || async {
                Err(CacheError::Encode(serde_json::from_str::<i64>("x").unwrap_err()))
            })
            .await;
        assert!(failed.is_err());

        let recovered: Result<i64, CacheError> =
            cache.get_or_load(&view, || async { Ok(5) }).await;
        assert_eq!(recovered.unwrap(), 5);

        cache.del(&[key]).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn invalidate_event_forces_the_next_loader_run() {
        let cache = test_cache().await;
        let event_id = 900_000 + i64::from(rand::random::<u16>());
        let view = keys::event_availability(event_id);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: tixgo_core::EventCounts = cache
                .get_or_load::<_, CacheError, _, _>(&view, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(tixgo_core::EventCounts::default())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate_event(event_id).await.unwrap();

        let _: tixgo_core::EventCounts = cache
            .get_or_load::<_, CacheError, _, _>(&view, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(tixgo_core::EventCounts::default())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "miss after invalidation");

        cache.invalidate_event(event_id).await.unwrap();
    }
}
