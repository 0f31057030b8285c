//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`crate::error::Error`] via a wrapper so
//! route handlers can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// Wrapper carrying the crate error into axum's response machinery.
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "server error in API handler");
        }

        let code = match &self.0 {
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::Decode { .. } => "decode_error",
            Error::Encode { .. } => "encode_error",
            Error::Io { .. } => "io_error",
            Error::NotFound { .. } => "not_found",
            Error::Publish(_) => "publish_error",
            Error::Connection { .. } => "broker_error",
            Error::ChannelClosed => "broker_error",
            Error::Validation(_) => "validation_error",
            Error::Config(_) => "config_error",
            Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError(Error::not_found("abc", "75")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unsupported_produces_400() {
        let response = AppError(Error::unsupported("text/plain")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn publish_produces_502() {
        let response = AppError(Error::Publish("broken pipe".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
