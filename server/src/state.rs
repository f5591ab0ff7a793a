//! Shared application state for HTTP handlers.

use std::sync::Arc;

use tixgo_redis::IdempotencyStore;
use tixgo_service::Services;

/// State cloned (cheaply, via `Arc`) into every handler.
#[derive(Clone)]
pub struct AppState {
    /// The assembled service layer.
    pub services: Arc<Services>,
    /// Idempotency store guarding create-hold.
    pub idempotency: Arc<IdempotencyStore>,
}

impl AppState {
    /// Bundle the shared resources.
    #[must_use]
    pub fn new(services: Arc<Services>, idempotency: Arc<IdempotencyStore>) -> Self {
        Self {
            services,
            idempotency,
        }
    }
}
