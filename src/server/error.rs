//! Error-to-HTTP response conversion.
//!
//! Wraps [`cafconvert_core::Error`] so route handlers can return
//! `Result<T, AppError>` and get a JSON error body with the right status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cafconvert_core::{Error, RequestId};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
    request_id: Option<RequestId>,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in request handler"
            );
        }

        let code = match &self.inner {
            Error::EmptySubmission(_) => "empty_submission",
            Error::IneligibleInput(_) => "ineligible_input",
            Error::Validation(_) => "validation_error",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::Transcode { .. } => "conversion_failed",
            Error::ArtifactVerification(_) => "conversion_failed",
            Error::Archive(_) => "archive_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        };

        // Client errors explain themselves; server errors keep converter and
        // filesystem details in the log.
        let message = match &self.inner {
            Error::Transcode { .. } | Error::ArtifactVerification(_) => {
                "Conversion failed".to_string()
            }
            _ if status.is_server_error() => {
                status.canonical_reason().unwrap_or("Internal error").to_string()
            }
            e => e.to_string(),
        };

        let body = json!({
            "error": message,
            "code": code,
            "request_id": self.request_id.map(|id| id.to_string()),
        });

        (status, axum::Json(body)).into_response()
    }
}
