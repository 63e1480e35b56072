//! HTTP-facing error type for the admin API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::Error;

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    /// Stable machine-readable code.
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: "CONFLICT",
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "VALIDATION_ERROR",
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "UPSTREAM_ERROR",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { .. } => Self::not_found(err.to_string()),
            Error::Conflict(message) => Self::conflict(message),
            Error::Validation(message) => Self::validation(message),
            Error::Configuration(message) => Self::bad_request(message),
            Error::Helix(_) | Error::Chat(_) | Error::Messaging(_) => {
                error!(error = %err, "upstream call failed inside an API handler");
                Self::bad_gateway(err.to_string())
            }
            other => {
                error!(error = %other, "API handler failed");
                Self::internal("internal server error")
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (Error::not_found("streamer", "ghost"), StatusCode::NOT_FOUND),
            (Error::conflict("already subscribed"), StatusCode::CONFLICT),
            (
                Error::validation("bad color"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (Error::config("missing token"), StatusCode::BAD_REQUEST),
            (
                Error::messaging("embed rejected"),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Other("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let api = ApiError::from(Error::Other("connection string".to_string()));
        assert_eq!(api.message, "internal server error");
    }
}
