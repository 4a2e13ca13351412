//! Unified error handling for the HTTP API.
//!
//! Every error renders as a JSON body `{ "code", "message" }`. Business-rule
//! failures carry their stable domain code; checkout failures add the full
//! `errors` list so clients can show every problem at once.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use local_market_core::{DomainError, ErrorCode, ErrorKind};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A business rule rejected the request.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Checkout validation failed; the quote's error codes are attached.
    #[error("checkout is not valid: {errors:?}")]
    CheckoutInvalid { errors: Vec<ErrorCode> },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorCode>>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => match e.kind() {
                ErrorKind::Invalid => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
            },
            Self::CheckoutInvalid { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, message, errors) = match self {
            Self::Domain(e) => (e.code.as_str().to_string(), e.message.clone(), None),
            Self::CheckoutInvalid { errors } => (
                ErrorCode::CheckoutInvalid.as_str().to_string(),
                "checkout is not valid".to_string(),
                Some(errors.clone()),
            ),
            Self::Database(RepositoryError::NotFound) => {
                ("NOT_FOUND".to_string(), "not found".to_string(), None)
            }
            Self::Database(RepositoryError::Conflict(msg)) => {
                ("CONFLICT".to_string(), msg.clone(), None)
            }
            // Don't expose internal error details to clients
            Self::Database(_) | Self::Internal(_) => (
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
                None,
            ),
            Self::NotFound(msg) => ("NOT_FOUND".to_string(), msg.clone(), None),
            Self::Unauthorized(msg) => ("UNAUTHORIZED".to_string(), msg.clone(), None),
            Self::Forbidden(msg) => ("FORBIDDEN".to_string(), msg.clone(), None),
            Self::BadRequest(msg) => (
                ErrorCode::InvalidRequest.as_str().to_string(),
                msg.clone(),
                None,
            ),
        };
        ErrorBody {
            code,
            message,
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}
