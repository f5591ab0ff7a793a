//! Order lookups.

use std::sync::Arc;

use tixgo_core::{OrderWithTickets, RepoError};
use tixgo_postgres::{query, Store};
use uuid::Uuid;

use crate::error::OrdersError;

/// Read access to confirmed orders.
pub struct OrdersService {
    store: Arc<Store>,
}

impl OrdersService {
    /// Wire the service.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fetch an order together with its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`OrdersError::OrderNotFound`] for an unknown id.
    pub async fn get_order_with_tickets(
        &self,
        order_id: Uuid,
    ) -> Result<OrderWithTickets, OrdersError> {
        let mut conn = self.store.acquire().await.map_err(OrdersError::Repo)?;
        query::order_with_tickets(&mut *conn, order_id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => OrdersError::OrderNotFound,
                other => OrdersError::Repo(other),
            })
    }
}
