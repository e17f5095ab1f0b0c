//! Mapping of [`Error`] onto HTTP responses.
//!
//! Client errors carry their message in `detail`, server errors in `error`.

use crate::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

impl Error {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_)
            | Self::ModelLoad(_)
            | Self::Inference(_)
            | Self::OperationFailed { .. }
            | Self::Recording(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        let body = if status.is_client_error() {
            serde_json::json!({ "detail": message })
        } else {
            serde_json::json!({ "error": message })
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;
    use test_case::test_case;

    #[test_case(Error::Unauthorized("x".to_string()), StatusCode::FORBIDDEN ; "unauthorized")]
    #[test_case(Error::from(ValidationError::MissingInput), StatusCode::BAD_REQUEST ; "missing")]
    #[test_case(Error::from(ValidationError::TooShort), StatusCode::BAD_REQUEST ; "too short")]
    #[test_case(Error::from(ValidationError::InvisibleContent), StatusCode::BAD_REQUEST ; "invisible")]
    #[test_case(Error::MalformedBody("x".to_string()), StatusCode::BAD_REQUEST ; "malformed")]
    #[test_case(Error::PayloadTooLarge("x".to_string()), StatusCode::PAYLOAD_TOO_LARGE ; "payload too large")]
    #[test_case(Error::Inference("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR ; "inference")]
    #[test_case(Error::Busy("x".to_string()), StatusCode::SERVICE_UNAVAILABLE ; "busy")]
    #[test_case(
        Error::OperationFailed { operation: "x".to_string(), cause: "y".to_string() },
        StatusCode::INTERNAL_SERVER_ERROR ;
        "operation failed"
    )]
    fn test_status_code(error: Error, expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
        assert_eq!(error.into_response().status(), expected);
    }
}
