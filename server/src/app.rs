//! Application wiring: storage, services, background tasks, and serving.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tixgo_postgres::{PgConfig, Store};
use tixgo_redis::idempotency::DEFAULT_RESULT_TTL;
use tixgo_redis::{keys, Cache, EventsPubSub, IdempotencyStore, SlidingWindowLimiter};
use tixgo_service::{Services, ServicesConfig};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

/// Create-hold admissions per client key within the window.
const RATE_LIMIT: i64 = 10;
/// Sliding-window width for the rate limiter.
const RATE_WINDOW: Duration = Duration::from_secs(60);
/// How often expired holds are swept.
const EXPIRE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Grace period for background tasks after the listener stops.
const SHUTDOWN_WINDOW: Duration = Duration::from_secs(5);

/// The wired application: router plus background tasks.
pub struct App {
    cfg: Config,
    router: Router,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Connect to Postgres and Redis, assemble the services, and spawn the
    /// expiry sweeper and the event-changed consumer.
    ///
    /// # Errors
    ///
    /// Returns an error when either backend is unreachable; the caller exits.
    pub async fn new(cfg: Config) -> anyhow::Result<Self> {
        let pool = tixgo_postgres::connect(&PgConfig {
            dsn: cfg.postgres.dsn(),
            max_connections: 10,
        })
        .await?;
        tracing::info!(host = %cfg.postgres.host, db = %cfg.postgres.db, "postgres connected");

        let (client, manager) = tixgo_redis::connect(&cfg.redis.url()).await?;
        tracing::info!(addr = %cfg.redis.addr, "redis connected");

        let store = Arc::new(Store::new(pool));
        let cache = Arc::new(Cache::new(manager.clone()));
        let pubsub = Arc::new(EventsPubSub::new(client, manager.clone()));
        let limiter = Arc::new(SlidingWindowLimiter::new(
            manager.clone(),
            keys::rate_limit_prefix(),
            RATE_LIMIT,
            RATE_WINDOW,
        ));
        let idempotency = Arc::new(IdempotencyStore::new(manager, DEFAULT_RESULT_TTL));

        let services = Arc::new(Services::new(
            store,
            Arc::clone(&cache),
            Arc::clone(&pubsub),
            Some(limiter),
            ServicesConfig::default(),
        ));

        let state = AppState::new(Arc::clone(&services), idempotency);
        let router = build_router(state);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            spawn_expiry_sweeper(Arc::clone(&services), shutdown_rx.clone()),
            spawn_change_consumer(pubsub, cache, shutdown_rx),
        ];

        Ok(Self {
            cfg,
            router,
            shutdown_tx,
            tasks,
        })
    }

    /// The assembled router; integration tests serve it on their own
    /// listener.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until SIGINT/SIGTERM, then stop background tasks within the
    /// shutdown window.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.cfg.server.host, self.cfg.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(address = %addr, "http server listening");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if tokio::time::timeout(SHUTDOWN_WINDOW, task).await.is_err() {
                tracing::warn!("background task did not stop within the shutdown window");
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

fn spawn_expiry_sweeper(
    services: Arc<Services>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXPIRE_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = EXPIRE_SWEEP_INTERVAL.as_secs(),
            "expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = ticker.tick() => {
                    if let Err(err) = services.reservation.expire().await {
                        tracing::warn!(error = %err, "expiry sweep failed");
                    }
                }
            }
        }
    })
}

fn spawn_change_consumer(
    pubsub: Arc<EventsPubSub>,
    cache: Arc<Cache>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let handler_cache = Arc::clone(&cache);
            let result = pubsub
                .subscribe(shutdown.clone(), move |event_id| {
                    let cache = Arc::clone(&handler_cache);
                    async move {
                        // Re-invalidation is idempotent; the write path already
                        // dropped these keys, this catches cross-process writers.
                        if let Err(err) = cache.invalidate_event(event_id).await {
                            tracing::warn!(event_id, error = %err, "consumer invalidation failed");
                        }
                    }
                })
                .await;

            if *shutdown.borrow() {
                return;
            }
            match result {
                Ok(()) => tracing::warn!("event subscription ended, reconnecting in 5s"),
                Err(err) => {
                    tracing::warn!(error = %err, "event subscription failed, reconnecting in 5s");
                }
            }

            let mut shutdown_wait = shutdown.clone();
            tokio::select! {
                _ = shutdown_wait.changed() => return,
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
        }
    })
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
