//! TixGo HTTP server.
//!
//! Reservation core for an event-ticketing service: transactional seat
//! holds over Postgres, with Redis-backed caching, rate limiting,
//! idempotency, and change notifications.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tixgo_server::{App, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tixgo=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let app = match App::new(cfg).await {
        Ok(app) => app,
        Err(err) => {
            tracing::error!(error = %err, "failed to start application");
            std::process::exit(1);
        }
    };

    if let Err(err) = app.run().await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}
