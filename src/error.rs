//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the service-level error type. Connection-local
//! failures ([`crate::domain::DeliveryError`]) never reach this level: they
//! only evict the affected connection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::bus::BusError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "bus error: bus unavailable: connection refused"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Service-level error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                 |
/// |-----------|---------------|-----------------------------|
/// | 1000–1999 | Validation    | 400 Bad Request             |
/// | 3000–3999 | Transport     | 503 Service Unavailable     |
/// | 5000–5999 | Startup       | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The distribution bus rejected an operation.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// The subscription could not be re-established; this instance can no
    /// longer fan out messages from its peers.
    #[error("subscription lost after {attempts} consecutive failed attempts")]
    SubscriptionLost {
        /// Consecutive failed subscribe attempts before giving up.
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Bus(_) => 3001,
            Self::SubscriptionLost { .. } => 3002,
            Self::Config(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Bus(_) | Self::SubscriptionLost { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_errors_map_to_service_unavailable() {
        let err = GatewayError::from(BusError::Unavailable("down".into()));
        assert_eq!(err.error_code(), 3001);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "bus error: bus unavailable: down");
    }

    #[test]
    fn subscription_lost_reports_attempts() {
        let err = GatewayError::SubscriptionLost { attempts: 5 };
        assert_eq!(
            err.to_string(),
            "subscription lost after 5 consecutive failed attempts"
        );
    }

    #[test]
    fn into_response_sets_status() {
        let response = GatewayError::InvalidRequest("empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
