//! Service-level error kinds.
//!
//! Repository kinds become service kinds here; HTTP status codes are
//! assigned only at the transport boundary. `hold expired` and
//! `hold conflict` stay distinct on purpose: one means the claim lapsed,
//! the other that a concurrent writer won.

use std::time::Duration;

use thiserror::Error;
use tixgo_core::RepoError;
use tixgo_redis::CacheError;

/// Failures of the reservation state machine.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The hold request named no seats.
    #[error("no seats selected")]
    NoSeatsSelected,

    /// The order total must be strictly positive.
    #[error("total must be positive")]
    InvalidTotal,

    /// The hold raced and could not claim every requested seat.
    #[error("seats unavailable")]
    SeatsUnavailable,

    /// A concurrent writer won; the client may retry.
    #[error("hold conflict")]
    HoldConflict,

    /// The hold lapsed before it was confirmed.
    #[error("hold expired")]
    HoldExpired,

    /// No hold with that id exists.
    #[error("hold not found")]
    HoldNotFound,

    /// The sliding window is full.
    #[error("rate limited, retry in {retry_after:?}")]
    RateLimited {
        /// How long the client should wait.
        retry_after: Duration,
    },

    /// The cache layer failed (rate-limit gate or invalidation path).
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Any other storage failure.
    #[error(transparent)]
    Repo(RepoError),
}

/// Failures of the cached read views.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No event with that id exists.
    #[error("event not found")]
    EventNotFound,

    /// The cache layer failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Any other storage failure.
    #[error(transparent)]
    Repo(RepoError),
}

/// Failures of venue/seat/event administration.
#[derive(Debug, Error)]
pub enum AdminError {
    /// A venue with the same name already exists.
    #[error("venue already exists")]
    VenueConflict,

    /// A seat with the same position already exists.
    #[error("some seats already exist")]
    SeatsConflict,

    /// An event with the same attributes already exists.
    #[error("event already exists")]
    EventConflict,

    /// The referenced venue does not exist.
    #[error("venue not found")]
    VenueNotFound,

    /// The event schedule is inverted or empty.
    #[error("event must start before it ends")]
    InvalidSchedule,

    /// Any other storage failure.
    #[error(transparent)]
    Repo(RepoError),
}

/// Failures of order lookups.
#[derive(Debug, Error)]
pub enum OrdersError {
    /// No order with that id exists.
    #[error("order not found")]
    OrderNotFound,

    /// Any other storage failure.
    #[error(transparent)]
    Repo(RepoError),
}
