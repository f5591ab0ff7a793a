//! Atomic sliding-window rate limiter.
//!
//! One Lua round trip per decision: the script prunes entries older than the
//! window from a sorted set, records the current hit under a random member
//! (so identical timestamps do not collapse distinct requests), and reports
//! the count plus a retry-after derived from the earliest surviving score.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use redis::aio::ConnectionManager;

use crate::CacheError;

// KEYS[1] = key
// ARGV[1] = now_ms, ARGV[2] = window_ms, ARGV[3] = limit, ARGV[4] = member
const SLIDING_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
redis.call('ZADD', key, 'NX', now, member)
local count = redis.call('ZCARD', key)
redis.call('PEXPIRE', key, window)

if count > limit then
  local earliest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
  local earliest_score = tonumber(earliest[2]) or (now - window)
  local retry_ms = window - (now - earliest_score)
  if retry_ms < 0 then retry_ms = 0 end
  return {0, count, retry_ms}
end
return {1, count, 0}
";

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    /// Whether the call is admitted.
    pub allowed: bool,
    /// Entries currently inside the window, including this call.
    pub current: i64,
    /// How long to wait before the window frees a slot; zero when allowed.
    pub retry_after: Duration,
}

/// Sliding-window counter keyed by `{prefix}:{suffix}`.
pub struct SlidingWindowLimiter {
    conn: ConnectionManager,
    prefix: String,
    limit: i64,
    window: Duration,
    script: redis::Script,
}

impl SlidingWindowLimiter {
    /// Fix the key prefix, admission limit, and window at construction.
    #[must_use]
    pub fn new(
        conn: ConnectionManager,
        prefix: impl Into<String>,
        limit: i64,
        window: Duration,
    ) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            limit,
            window,
            script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    #[allow(clippy::cast_possible_truncation)] // timestamps fit in u64 until year 2554
    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    fn random_member() -> String {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Check and record one call for `suffix` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver or script failure; callers
    /// should treat that as a denial.
    pub async fn allow(&self, suffix: &str) -> Result<RateLimitDecision, CacheError> {
        let key = self.key(suffix);
        let now_ms = Self::now_ms();
        let window_ms = self.window.as_millis() as u64;
        let member = Self::random_member();

        let mut conn = self.conn.clone();
        let (admitted, current, retry_ms): (i64, i64, i64) = self
            .script
            .key(&key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(self.limit)
            .arg(&member)
            .invoke_async(&mut conn)
            .await?;

        let decision = RateLimitDecision {
            allowed: admitted == 1,
            current,
            retry_after: Duration::from_millis(retry_ms.max(0) as u64),
        };

        if !decision.allowed {
            metrics::counter!("ratelimit.denied.total").increment(1);
            tracing::warn!(
                key = %key,
                current = decision.current,
                limit = self.limit,
                retry_after_ms = retry_ms,
                "rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Drop all recorded hits for `suffix`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure.
    pub async fn reset(&self, suffix: &str) -> Result<(), CacheError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(suffix)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live-Redis tests; run with a local server:
    // docker run -d -p 6379:6379 redis:7-alpine

    async fn limiter(limit: i64, window: Duration) -> SlidingWindowLimiter {
        let (_client, manager) = crate::connect("redis://127.0.0.1:6379")
            .await
            .expect("redis not reachable");
        SlidingWindowLimiter::new(manager, "tixgo:test:rl", limit, window)
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn admits_up_to_the_limit() {
        let limiter = limiter(5, Duration::from_secs(60)).await;
        let suffix = format!("allow:{}", uuid::Uuid::new_v4());

        for i in 1..=5 {
            let decision = limiter.allow(&suffix).await.unwrap();
            assert!(decision.allowed, "call {i} should be admitted");
            assert_eq!(decision.current, i);
            assert_eq!(decision.retry_after, Duration::ZERO);
        }

        limiter.reset(&suffix).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn denies_over_the_limit_with_retry_after() {
        let limiter = limiter(3, Duration::from_secs(60)).await;
        let suffix = format!("deny:{}", uuid::Uuid::new_v4());

        for _ in 0..3 {
            assert!(limiter.allow(&suffix).await.unwrap().allowed);
        }

        let denied = limiter.allow(&suffix).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.current > 3);
        assert!(denied.retry_after > Duration::ZERO);
        assert!(denied.retry_after <= Duration::from_secs(60));

        limiter.reset(&suffix).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn window_slides_open_again() {
        let limiter = limiter(2, Duration::from_secs(2)).await;
        let suffix = format!("slide:{}", uuid::Uuid::new_v4());

        assert!(limiter.allow(&suffix).await.unwrap().allowed);
        assert!(limiter.allow(&suffix).await.unwrap().allowed);
        assert!(!limiter.allow(&suffix).await.unwrap().allowed);

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(limiter.allow(&suffix).await.unwrap().allowed);

        limiter.reset(&suffix).await.unwrap();
    }
}
