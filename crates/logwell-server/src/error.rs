//! Error types for the HTTP boundary.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use logwell_reader::ReaderError;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the log server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// The request's secret was missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// No shared secret is configured; the server cannot authorize anyone.
    #[error("server password is not configured")]
    Unconfigured,

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The configured log file does not exist.
    #[error("log file not found: {0}")]
    LogFileMissing(PathBuf),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ReaderError> for ServerError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::NotFound(path) => Self::LogFileMissing(path),
            ReaderError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::BindFailed(_, _)
            | Self::Unconfigured
            | Self::LogFileMissing(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            error: self.to_string(),
        };
        let json = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string());

        (status, [("content-type", "application/json")], json).into_response()
    }
}
