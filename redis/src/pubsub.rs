//! The `event_changed` pub/sub channel.
//!
//! Publishing is fire-and-forget from after-commit hooks; delivery is
//! at-most-once and unordered across publishers, so subscribers must be
//! idempotent (typically: re-invalidate or re-warm the event's cache keys).

use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{keys, CacheError};

#[derive(Debug, Serialize, Deserialize)]
struct EventChangedMessage {
    #[serde(rename = "type")]
    kind: String,
    event_id: i64,
    ts_unix: i64,
}

/// Publisher/subscriber pair for the single `events:changed` channel.
pub struct EventsPubSub {
    client: redis::Client,
    conn: ConnectionManager,
    channel: String,
}

impl EventsPubSub {
    /// Wrap a client (for subscriptions) and a managed connection (for
    /// publishing).
    #[must_use]
    pub fn new(client: redis::Client, conn: ConnectionManager) -> Self {
        Self {
            client,
            conn,
            channel: keys::events_changed_channel(),
        }
    }

    /// Announce that `event_id` changed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on driver failure; after-commit hooks
    /// log and swallow it.
    pub async fn publish_event_changed(&self, event_id: i64) -> Result<(), CacheError> {
        let message = EventChangedMessage {
            kind: "event_changed".to_string(),
            event_id,
            ts_unix: chrono::Utc::now().timestamp(),
        };
        let payload = serde_json::to_string(&message)?;

        let mut conn = self.conn.clone();
        let _: () = conn.publish(&self.channel, payload).await?;

        metrics::counter!("pubsub.published.total").increment(1);
        Ok(())
    }

    /// Consume the channel until `shutdown` fires or the connection drops.
    ///
    /// Each message carrying a non-zero event id is dispatched to `handler`.
    /// Undecodable payloads are skipped. Returns `Ok(())` on shutdown or
    /// stream end; reconnecting is the caller's loop.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the subscription cannot be set up.
    pub async fn subscribe<F, Fut>(
        &self,
        mut shutdown: watch::Receiver<bool>,
        handler: F,
    ) -> Result<(), CacheError>
    where
        F: Fn(i64) -> Fut,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "subscribed to event changes");

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                message = messages.next() => {
                    let Some(message) = message else { return Ok(()) };
                    let Ok(payload) = message.get_payload::<String>() else { continue };
                    match serde_json::from_str::<EventChangedMessage>(&payload) {
                        Ok(event) if event.event_id != 0 => handler(event.event_id).await,
                        Ok(_) => {}
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping undecodable pubsub payload");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_shape_is_stable() {
        let message = EventChangedMessage {
            kind: "event_changed".to_string(),
            event_id: 5,
            ts_unix: 1_700_000_000,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "event_changed");
        assert_eq!(json["event_id"], 5);
        assert_eq!(json["ts_unix"], 1_700_000_000);
    }

    // Live-Redis test; run with a local server:
    // docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn published_changes_reach_the_subscriber() {
        let (client, manager) = crate::connect("redis://127.0.0.1:6379")
            .await
            .expect("redis not reachable");
        let pubsub = std::sync::Arc::new(EventsPubSub::new(client, manager));

        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = {
            let pubsub = std::sync::Arc::clone(&pubsub);
            tokio::spawn(async move {
                pubsub
                    .subscribe(shutdown_rx, move |event_id| {
                        let seen_tx = seen_tx.clone();
                        async move {
                            let _ = seen_tx.send(event_id);
                        }
                    })
                    .await
            })
        };

        // Give the subscription a moment to be registered server-side.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        pubsub.publish_event_changed(321).await.unwrap();

        let seen = tokio::time::timeout(std::time::Duration::from_secs(2), seen_rx.recv())
            .await
            .expect("timed out waiting for message")
            .unwrap();
        assert_eq!(seen, 321);

        shutdown_tx.send(true).unwrap();
        consumer.await.unwrap().unwrap();
    }
}
