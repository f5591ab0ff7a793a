//! Shared vocabulary for the TixGo reservation core.
//!
//! This crate holds the domain model (venues, seats, events, holds, orders,
//! tickets) and the repository-level error kinds that the storage crates
//! translate engine errors into. It deliberately has no database or cache
//! dependencies so every other crate can depend on it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod error;

pub use domain::{
    Event, EventCounts, Hold, NewSeat, Order, OrderWithTickets, Seat, SeatStatus, SeatWithStatus,
    Ticket, Venue,
};
pub use error::RepoError;
