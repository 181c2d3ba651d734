//! Error handling for the Farm Produce Distribution Platform
//!
//! Every failure the order flow can recover from has its own variant;
//! handlers return `AppResult<T>` and the `IntoResponse` impl maps each
//! variant to a consistent JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use shared::ReservationState;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Core business logic errors
    #[error("Insufficient stock for {product}: requested {requested_kg} kg, available {available_kg} kg")]
    InsufficientStock {
        product: String,
        requested_kg: Decimal,
        available_kg: Decimal,
    },

    #[error("Reservation already finalized in state {0}")]
    AlreadyFinalized(ReservationState),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Concurrent stock update detected")]
    ConcurrencyConflict,

    // External service errors
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Messaging gateway error: {0}")]
    MessagingGateway(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_kg: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_kg: Option<Decimal>,
}

impl ErrorDetail {
    pub(crate) fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            field: None,
            requested_kg: None,
            available_kg: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired".to_string()),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token".to_string()),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action".to_string(),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InsufficientStock {
                product,
                requested_kg,
                available_kg,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    requested_kg: Some(*requested_kg),
                    available_kg: Some(*available_kg),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_STOCK",
                        format!(
                            "Only {} kg of {} currently available ({} kg requested)",
                            available_kg, product, requested_kg
                        ),
                    )
                },
            ),
            AppError::AlreadyFinalized(state) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "ALREADY_FINALIZED",
                    format!("Reservation is already finalized ({})", state),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::ConcurrencyConflict => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "CONCURRENCY_CONFLICT",
                    "The stock changed while processing the request; please retry".to_string(),
                ),
            ),
            AppError::PaymentGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new(
                    "PAYMENT_GATEWAY_ERROR",
                    format!("Payment gateway error: {}", msg),
                ),
            ),
            AppError::MessagingGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new(
                    "MESSAGING_GATEWAY_ERROR",
                    format!("Messaging gateway error: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred".to_string()),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                ),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Postgres aborts one of two transactions that lock the same pallet rows
/// in conflicting order (40P01, deadlock) or that cannot be serialized
/// (40001). Both mean "lost a stock race": surfacing them as
/// `ConcurrencyConflict` lets the reservation retry loop replan instead of
/// failing the request with a server error.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
                return AppError::ConcurrencyConflict;
            }
        }
        AppError::DatabaseError(err)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct StubPgError(&'static str);

    impl fmt::Display for StubPgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "stub database error ({})", self.0)
        }
    }

    impl StdError for StubPgError {}

    impl sqlx::error::DatabaseError for StubPgError {
        fn message(&self) -> &str {
            "stub database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubPgError(code)))
    }

    #[test]
    fn deadlock_and_serialization_failures_become_concurrency_conflicts() {
        for code in ["40001", "40P01"] {
            let err: AppError = db_error(code).into();
            assert!(matches!(err, AppError::ConcurrencyConflict), "{}", code);
        }
    }

    #[test]
    fn other_database_errors_pass_through() {
        let err: AppError = db_error("23505").into();
        assert!(matches!(err, AppError::DatabaseError(_)));

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
