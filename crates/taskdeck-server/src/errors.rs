//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use taskdeck_tasks::{ErrorKind, TaskError};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine failure, mapped by [`ErrorKind`].
    #[error(transparent)]
    Task(#[from] TaskError),
    /// No caller identity on the request.
    #[error("missing caller identity")]
    Unauthorized,
    /// Caller lacks the role the route needs.
    #[error("{0} role required")]
    RoleRequired(&'static str),
    /// The server is draining and takes no new engine calls.
    #[error("server is shutting down")]
    ShuttingDown,
    /// Request body could not be read as the expected JSON.
    #[error("{0}")]
    Body(String),
    /// The blocking worker panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Status code and error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Task(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, kind.as_str())
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Body(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidArgument.as_str()),
            Self::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Self::RoleRequired(_) => (StatusCode::FORBIDDEN, ErrorKind::Forbidden.as_str()),
            Self::Worker(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Internal.as_str(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
