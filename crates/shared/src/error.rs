//! Application-wide error types.
//!
//! Every failed backend call ends up as an [`AppError`]. The display text is
//! what the UI shows, so each variant carries a user-facing message: either
//! the detail the backend sent or the static message for its status code.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Network(String),

    /// Malformed request (400).
    #[error("{0}")]
    BadRequest(String),

    /// Authentication failed or session expired (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Access denied (403).
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Server gave up waiting for the request (408).
    #[error("{0}")]
    RequestTimeout(String),

    /// Conflict, e.g. duplicate entry (409).
    #[error("{0}")]
    Conflict(String),

    /// Upload exceeds the backend limit (413).
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Validation error (422).
    #[error("{0}")]
    Validation(String),

    /// Too many requests (429).
    #[error("{0}")]
    RateLimited(String),

    /// Internal server error (500 and unlisted 5xx).
    #[error("{0}")]
    Internal(String),

    /// Bad gateway (502).
    #[error("{0}")]
    BadGateway(String),

    /// Service unavailable (503).
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Gateway timeout (504).
    #[error("{0}")]
    GatewayTimeout(String),

    /// Any other non-success status.
    #[error("{message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// User-facing message.
        message: String,
    },
}

impl AppError {
    /// Builds the error for an HTTP status.
    ///
    /// `detail` is the message extracted from the response body; when absent
    /// the static message for the status is used.
    #[must_use]
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let message = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| Self::default_message(status).to_string());
        match status {
            0 => Self::Network(message),
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            408 => Self::RequestTimeout(message),
            409 => Self::Conflict(message),
            413 => Self::PayloadTooLarge(message),
            422 => Self::Validation(message),
            429 => Self::RateLimited(message),
            502 => Self::BadGateway(message),
            503 => Self::ServiceUnavailable(message),
            504 => Self::GatewayTimeout(message),
            500..=599 => Self::Internal(message),
            _ => Self::Unexpected { status, message },
        }
    }

    /// Returns the static user-facing message for an HTTP status.
    #[must_use]
    pub const fn default_message(status: u16) -> &'static str {
        match status {
            0 => "Network error. Please check your connection and try again.",
            400 => "Invalid request. Please check your input and try again.",
            401 => "Your session has expired. Please log in again.",
            403 => "You do not have permission to perform this action.",
            404 => "The requested resource was not found.",
            408 => "The request timed out. Please try again.",
            409 => "This action conflicts with the current state. Please refresh and try again.",
            413 => "The uploaded file is too large.",
            422 => "The submitted data could not be processed. Please review and try again.",
            429 => "Too many requests. Please wait a moment and try again.",
            500 => "An unexpected server error occurred. Please try again later.",
            502 => "The server is temporarily unreachable. Please try again shortly.",
            503 => "The service is temporarily unavailable. Please try again shortly.",
            504 => "The server took too long to respond. Please try again.",
            _ => "An unexpected error occurred. Please try again.",
        }
    }

    /// Returns the HTTP status code for this error, 0 for network failures.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Network(_) => 0,
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::RequestTimeout(_) => 408,
            Self::Conflict(_) => 409,
            Self::PayloadTooLarge(_) => 413,
            Self::Validation(_) => 422,
            Self::RateLimited(_) => 429,
            Self::Internal(_) => 500,
            Self::BadGateway(_) => 502,
            Self::ServiceUnavailable(_) => 503,
            Self::GatewayTimeout(_) => 504,
            Self::Unexpected { status, .. } => *status,
        }
    }

    /// Returns the error code for logs and telemetry.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RequestTimeout(_) => "REQUEST_TIMEOUT",
            Self::Conflict(_) => "CONFLICT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::BadGateway(_) => "BAD_GATEWAY",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            Self::Unexpected { .. } => "UNEXPECTED_STATUS",
        }
    }

    /// Whether a status is worth retrying: network failures, 408, 429 and 5xx.
    #[must_use]
    pub const fn is_retryable_status(status: u16) -> bool {
        matches!(status, 0 | 408 | 429 | 500..=599)
    }

    /// Whether this error is worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        Self::is_retryable_status(self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "NETWORK_ERROR")]
    #[case(400, "BAD_REQUEST")]
    #[case(401, "UNAUTHORIZED")]
    #[case(403, "FORBIDDEN")]
    #[case(404, "NOT_FOUND")]
    #[case(408, "REQUEST_TIMEOUT")]
    #[case(409, "CONFLICT")]
    #[case(413, "PAYLOAD_TOO_LARGE")]
    #[case(422, "VALIDATION_ERROR")]
    #[case(429, "RATE_LIMITED")]
    #[case(500, "INTERNAL_ERROR")]
    #[case(502, "BAD_GATEWAY")]
    #[case(503, "SERVICE_UNAVAILABLE")]
    #[case(504, "GATEWAY_TIMEOUT")]
    #[case(418, "UNEXPECTED_STATUS")]
    fn test_status_round_trip(#[case] status: u16, #[case] code: &str) {
        let err = AppError::from_status(status, None);
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
        assert_eq!(err.to_string(), AppError::default_message(status));
    }

    #[test]
    fn test_unlisted_5xx_is_internal() {
        let err = AppError::from_status(507, None);
        assert!(matches!(err, AppError::Internal(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_detail_overrides_static_message() {
        let err = AppError::from_status(409, Some("Client name already exists".into()));
        assert_eq!(err.to_string(), "Client name already exists");
    }

    #[test]
    fn test_blank_detail_falls_back() {
        let err = AppError::from_status(404, Some("   ".into()));
        assert_eq!(err.to_string(), "The requested resource was not found.");
    }

    #[rstest]
    #[case(0, true)]
    #[case(408, true)]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(404, false)]
    #[case(422, false)]
    fn test_retryable_statuses(#[case] status: u16, #[case] retryable: bool) {
        assert_eq!(AppError::is_retryable_status(status), retryable);
    }
}
