use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    /// Seat or quantity unavailable. Expected under contention; carries the
    /// conflicting seat ids so the client can re-render availability.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        seat_ids: Vec<Uuid>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Operation invalid for the entity's current state, e.g. promoting an
    /// expired hold or paying a cancelled order.
    #[error("Invalid state: {0}")]
    StateError(String),

    /// Lock-wait timeout or similar; safe for the caller to retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn conflict(message: impl Into<String>, seat_ids: Vec<Uuid>) -> Self {
        AppError::Conflict {
            message: message.into(),
            seat_ids,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StateError(_) => StatusCode::CONFLICT,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Conflict { .. } => "CONFLICT",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::StateError(_) => "STATE_ERROR",
            AppError::Transient(_) => "TRANSIENT_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            // Contention and retryable failures are normal operation.
            AppError::Conflict { message, seat_ids } => {
                warn!(message = %message, seats = seat_ids.len(), "Booking conflict");
            }
            AppError::Transient(msg) => {
                warn!(message = %msg, "Transient failure");
            }
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::StateError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let (public_message, details): (String, Option<Value>) = match &self {
            AppError::Conflict { message, seat_ids } => (
                message.clone(),
                Some(json!({ "unavailable_seats": seat_ids })),
            ),
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::StateError(msg)
            | AppError::Transient(msg) => (msg.clone(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::conflict("seat taken", vec![Uuid::new_v4()]);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn transient_maps_to_503() {
        let err = AppError::Transient("lock wait timeout".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn state_error_is_a_conflict_class_response() {
        let err = AppError::StateError("hold already promoted".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "STATE_ERROR");
    }
}
