//! Redis-backed collaborators of the reservation core.
//!
//! - [`cache`] — typed read-through cache with in-process single-flight
//! - [`ratelimit`] — atomic sliding-window limiter (one Lua round trip)
//! - [`idempotency`] — request de-duplication over `SET NX` locks
//! - [`pubsub`] — the `event_changed` channel
//! - [`keys`] — the `tixgo:v1` key namespace; each cached projection
//!   declares its key, value type, and TTL together
//!
//! All components share one [`ConnectionManager`]; the underlying driver
//! handles multiplexing, so cloning the manager per call is cheap.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use redis::aio::ConnectionManager;
use thiserror::Error;

pub mod cache;
pub mod idempotency;
pub mod keys;
pub mod pubsub;
pub mod ratelimit;

pub use cache::Cache;
pub use idempotency::IdempotencyStore;
pub use keys::TypedKey;
pub use pubsub::EventsPubSub;
pub use ratelimit::{RateLimitDecision, SlidingWindowLimiter};

/// Startup ping deadline.
const STARTUP_PING_DEADLINE: Duration = Duration::from_secs(3);

/// Errors from the Redis-backed components.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Driver or server failure.
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached value or message failed to (de)serialize.
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),

    /// The coalesced loader run this caller waited on failed; carries the
    /// leader's error text.
    #[error("shared loader failed: {0}")]
    FlightFailed(String),

    /// The startup ping did not answer in time.
    #[error("redis ping timed out")]
    PingTimeout,
}

/// Open a client and a managed connection, verifying connectivity with a
/// bounded `PING`.
///
/// The [`redis::Client`] is kept around for pub/sub subscriptions, which
/// need their own connection; everything else goes through the manager.
///
/// # Errors
///
/// Returns [`CacheError::PingTimeout`] if the server does not answer within
/// 3 seconds, or [`CacheError::Redis`] on connection failure.
pub async fn connect(url: &str) -> Result<(redis::Client, ConnectionManager), CacheError> {
    let client = redis::Client::open(url)?;
    let mut manager = ConnectionManager::new(client.clone()).await?;

    let pong: String = tokio::time::timeout(
        STARTUP_PING_DEADLINE,
        redis::cmd("PING").query_async(&mut manager),
    )
    .await
    .map_err(|_| CacheError::PingTimeout)??;

    tracing::debug!(pong = %pong, "redis connected");

    Ok((client, manager))
}
