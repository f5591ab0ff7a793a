//! Repository-level error kinds.
//!
//! Storage backends translate engine errors into these kinds; services then
//! map them onto their own error enums. HTTP status codes are assigned only
//! at the transport boundary.

use thiserror::Error;

/// Errors surfaced by the durable store's repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict")]
    Conflict,

    /// A hold attempt could not claim every requested seat.
    #[error("some seats unavailable")]
    SeatsUnavailable,

    /// The hold's expiry has passed (or the hold never existed).
    #[error("hold expired")]
    HoldExpired,

    /// A confirm found no seats still held under the hold.
    #[error("nothing to confirm")]
    NothingToConfirm,

    /// A transient serialization or deadlock conflict; eligible for retry.
    #[error("serialization conflict")]
    Serialization,

    /// Any other engine failure.
    #[error("database error: {0}")]
    Database(String),
}
