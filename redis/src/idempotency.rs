//! Request de-duplication for non-idempotent writes.
//!
//! A storage key maps to either a `LOCK` sentinel (a request is in flight)
//! or a `RES:`-prefixed serialized response. The lock is taken with a single
//! `SET NX PX`, so two racing requests cannot both win; the loser either
//! replays the winner's stored result or reports in-progress.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::CacheError;

const LOCK_SENTINEL: &str = "LOCK";
const RESULT_PREFIX: &str = "RES:";

/// Default retention of stored results.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Default lifetime of an in-flight lock; the upper bound on how long
/// duplicates are rejected as in-progress.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

/// Key → `LOCK | RES:<payload>` store over Redis.
pub struct IdempotencyStore {
    conn: ConnectionManager,
    result_ttl: Duration,
}

impl IdempotencyStore {
    /// Wrap a managed connection; `result_ttl` bounds result retention.
    #[must_use]
    pub const fn new(conn: ConnectionManager, result_ttl: Duration) -> Self {
        Self { conn, result_ttl }
    }

    /// Return the stored result payload, if the key holds one. A `LOCK`
    /// sentinel yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn get_result(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value.and_then(|v| v.strip_prefix(RESULT_PREFIX).map(str::to_string)))
    }

    /// Try to take the in-flight lock; `true` when this caller won.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn acquire_lock(&self, key: &str, lock_ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(LOCK_SENTINEL)
            .arg("NX")
            .arg("PX")
            .arg(lock_ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(outcome.is_some())
    }

    /// Overwrite the key with the serialized response; releases the lock
    /// implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn save_result(&self, key: &str, payload: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let value = format!("{RESULT_PREFIX}{payload}");
        let _: () = conn.set_ex(key, value, self.result_ttl.as_secs()).await?;
        Ok(())
    }

    /// Drop the key so a failed request can be retried immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn release(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live-Redis tests; run with a local server:
    // docker run -d -p 6379:6379 redis:7-alpine

    async fn store() -> IdempotencyStore {
        let (_client, manager) = crate::connect("redis://127.0.0.1:6379")
            .await
            .expect("redis not reachable");
        IdempotencyStore::new(manager, DEFAULT_RESULT_TTL)
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn lock_is_exclusive_until_released() {
        let store = store().await;
        let key = format!("tixgo:test:idem:{}", uuid::Uuid::new_v4());

        assert!(store.acquire_lock(&key, DEFAULT_LOCK_TTL).await.unwrap());
        assert!(!store.acquire_lock(&key, DEFAULT_LOCK_TTL).await.unwrap());

        // A lock is not a result.
        assert_eq!(store.get_result(&key).await.unwrap(), None);

        store.release(&key).await.unwrap();
        assert!(store.acquire_lock(&key, DEFAULT_LOCK_TTL).await.unwrap());

        store.release(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn saved_result_replays_verbatim() {
        let store = store().await;
        let key = format!("tixgo:test:idem:{}", uuid::Uuid::new_v4());
        let payload = r#"{"hold_id":"4b4b1c2e"}"#;

        assert!(store.acquire_lock(&key, DEFAULT_LOCK_TTL).await.unwrap());
        store.save_result(&key, payload).await.unwrap();

        assert_eq!(store.get_result(&key).await.unwrap().as_deref(), Some(payload));
        // The result replaced the lock; late lockers lose and find it.
        assert!(!store.acquire_lock(&key, DEFAULT_LOCK_TTL).await.unwrap());

        store.release(&key).await.unwrap();
    }
}
