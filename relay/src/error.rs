//! Relay error type and its HTTP mapping.
//!
//! Every failure becomes `{ "error": <message> }` with a fixed status. The
//! client-visible message for upstream failures is generic; upstream detail
//! is logged at the call site and never copied into the body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request body is not a valid chat request.
    #[error("{0}")]
    InvalidBody(String),

    /// The upstream API key is missing from the environment.
    #[error("{var} is not configured")]
    NotConfigured { var: String },

    /// Missing or wrong bearer key while `RELAY_ACCESS_KEY` is set.
    #[error("Missing or invalid authorization.")]
    Unauthorized,

    /// Upstream answered 429.
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    /// Upstream answered 402 (credits or quota exhausted).
    #[error("Service temporarily unavailable. Please try again later.")]
    Unavailable,

    /// Upstream answered any other non-success status.
    #[error("Failed to process your message. Please try again.")]
    Upstream { status: u16 },

    /// Upstream could not be reached or did not answer in time.
    #[error("Failed to reach the chat service. Please try again.")]
    Unreachable,
}

impl RelayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::PAYMENT_REQUIRED,
            Self::InvalidBody(_) | Self::NotConfigured { .. } | Self::Upstream { .. } | Self::Unreachable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
