//! Error types for mind-rt
//!
//! Request-path failures (validation, backend, staleness) are not errors at
//! this level: they are reported as [`crate::RequestOutcome`] values and node
//! status. These variants cover setup and the control surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for mind-rt
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Graph node not found
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Operation not valid for the node or its current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// mind-common error
    #[error(transparent)]
    Common(#[from] mind_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using mind-rt Error
pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::NodeNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
            Error::Http(_) | Error::Client(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
