//! `PostgreSQL` storage for the TixGo reservation core.
//!
//! This crate owns the connection pool, the serializable unit-of-work
//! transaction runner with after-commit hooks, and the repository modules
//! that hold the reservation pipeline's SQL:
//!
//! - [`reservation`] — the hold/confirm/cancel/expire state machine
//! - [`query`] — read projections (events, counters, seat listings, orders)
//! - [`admin`] — venue/seat/event materialization
//!
//! All queries use runtime-checked `sqlx::query(...).bind(...)` and translate
//! engine errors into [`tixgo_core::RepoError`] kinds.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod query;
pub mod reservation;
mod store;

pub use store::{connect, is_retryable, translate_db_err, Hooks, PgConfig, Store};
