use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use mongodb::error::TRANSIENT_TRANSACTION_ERROR;
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for every ledger operation. Validation and authorization
/// failures are rejected before any mutation; conflict covers state that
/// makes the requested change impossible (overpaying a debt, removing a
/// member with an open balance). Storage wraps driver failures, including
/// aborted transactions.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] mongodb::error::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    message: String,
}

impl ApiError {
    /// Machine-checkable kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Authorization(_) => "authorization",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::Storage(_) => "storage",
        }
    }

    /// Whether the underlying store aborted transiently and the whole
    /// transaction can be retried from the top.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Storage(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Driver details stay in the logs, not in responses.
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.kind(),
            message,
        })
    }
}
