//! The single place service error kinds become HTTP status codes.
//!
//! Bodies are `{"error":"..."}`. Rate-limit denials and idempotency
//! conflicts carry a `Retry-After` hint.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tixgo_service::{AdminError, OrdersError, QueryError, ReservationError};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// An HTTP-mapped error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Build an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 409 Conflict.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 500 Internal Server Error with the cause logged, not exposed.
    #[must_use]
    pub fn internal(source: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %source, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    /// Attach a `Retry-After` hint in whole seconds.
    #[must_use]
    pub const fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    /// The mapped status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response();

        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::NoSeatsSelected | ReservationError::InvalidTotal => {
                Self::bad_request(err.to_string())
            }
            ReservationError::SeatsUnavailable => Self::conflict("seats unavailable"),
            ReservationError::HoldConflict => Self::conflict("hold conflict"),
            ReservationError::HoldExpired => Self::conflict("hold expired"),
            ReservationError::HoldNotFound => Self::not_found("hold not found"),
            ReservationError::RateLimited { retry_after } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "rate limited")
                    .with_retry_after(retry_after.as_secs().max(1))
            }
            ReservationError::Cache(ref source) => Self::internal(source),
            ReservationError::Repo(ref source) => Self::internal(source),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EventNotFound => Self::not_found("event not found"),
            QueryError::Cache(ref source) => Self::internal(source),
            QueryError::Repo(ref source) => Self::internal(source),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::VenueConflict => Self::conflict("venue conflict"),
            AdminError::SeatsConflict => Self::conflict("seats conflict"),
            AdminError::EventConflict => Self::conflict("event conflict"),
            AdminError::VenueNotFound => Self::not_found("event or venue does not exist"),
            AdminError::InvalidSchedule => Self::bad_request(err.to_string()),
            AdminError::Repo(ref source) => Self::internal(source),
        }
    }
}

impl From<OrdersError> for ApiError {
    fn from(err: OrdersError) -> Self {
        match err {
            OrdersError::OrderNotFound => Self::not_found("order not found"),
            OrdersError::Repo(ref source) => Self::internal(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reservation_kinds_map_to_the_status_table() {
        let cases = [
            (ReservationError::NoSeatsSelected, StatusCode::BAD_REQUEST),
            (ReservationError::SeatsUnavailable, StatusCode::CONFLICT),
            (ReservationError::HoldConflict, StatusCode::CONFLICT),
            (ReservationError::HoldExpired, StatusCode::CONFLICT),
            (ReservationError::HoldNotFound, StatusCode::NOT_FOUND),
            (
                ReservationError::RateLimited {
                    retry_after: Duration::from_secs(30),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let err = ApiError::from(ReservationError::RateLimited {
            retry_after: Duration::from_secs(42),
        });
        let response = err.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("42")
        );
    }

    #[test]
    fn sub_second_retry_after_rounds_up_to_one() {
        let err = ApiError::from(ReservationError::RateLimited {
            retry_after: Duration::from_millis(200),
        });
        let response = err.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("1")
        );
    }
}
