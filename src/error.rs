use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::services::PaymentError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Settlement failed: {0}")]
    Settlement(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Settlement(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client sees. Internal causes stay in the server log.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(cause) = &self {
            tracing::error!(error = %cause, "Request failed with internal error");
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::WalletNotFound(_)
            | PaymentError::BusinessNotFound(_)
            | PaymentError::RequestNotFound(_) => AppError::NotFound(err.to_string()),
            PaymentError::InvalidAddress(_) | PaymentError::Validation(_) => {
                AppError::Validation(err.to_string())
            }
            PaymentError::NotAuthorized(msg) => AppError::Forbidden(msg),
            PaymentError::InvalidState(msg) => AppError::InvalidState(msg),
            PaymentError::Conflict(msg) => AppError::Conflict(msg),
            PaymentError::Unauthorized(msg) => AppError::Unauthorized(msg),
            PaymentError::Settlement(e) => AppError::Settlement(e.to_string()),
            PaymentError::Storage(RepositoryError::Conflict(msg)) => AppError::Conflict(msg),
            PaymentError::Storage(e) => AppError::Internal(e.to_string()),
            PaymentError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}
