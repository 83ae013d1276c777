//! Error types for the HTTP front end.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use locker_core::LockerError;
use serde::Serialize;
use tracing::error;

/// Errors returned to HTTP clients.
///
/// Refused locks and bad tokens never get here; they are normal `ok: false`
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Locker(#[from] LockerError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("No route for {0}")]
    NotFound(String),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ServerError::Locker(LockerError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT")
            }
            ServerError::Locker(LockerError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
            }
            ServerError::Locker(LockerError::Serialization(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            ServerError::Locker(LockerError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            code: &'static str,
        }

        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
