use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use crate::services::PhotoError;
use crate::store::StoreError;

use super::types::ErrorBody;
use super::validation::FieldError;

/// Error rendered as a JSON `{"error": ...}` body, for the AJAX endpoints.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),

    Unauthorized(String),

    Forbidden(String),

    NotFound(String),

    Busy(String),

    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Busy(msg) => write!(f, "Busy: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Busy(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorBody { error: error_message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::Validation(err.message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("User not found".to_string()),
            StoreError::TableEmpty => ApiError::Internal("Database file empty".to_string()),
            StoreError::Busy => ApiError::Busy("Database busy".to_string()),
            StoreError::Unavailable(msg) => {
                ApiError::Internal(format!("Cannot open database: {msg}"))
            }
            StoreError::MissingColumn(col) => {
                ApiError::Internal(format!("Table missing {col} column"))
            }
            StoreError::EmailTaken => ApiError::Validation("Email already exists.".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Login required".to_string())
    }

    #[must_use]
    pub fn forbidden() -> Self {
        ApiError::Forbidden("Forbidden".to_string())
    }
}

/// Error for the browser form flows, rendered as a plain-text body the way
/// the page scripts expect.
#[derive(Debug)]
pub struct FormError {
    pub status: StatusCode,
    pub message: String,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for FormError {}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Form request failed: {}", self.message);
        }
        (self.status, self.message).into_response()
    }
}

impl FormError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "Forbidden".to_string(),
        }
    }
}

impl From<FieldError> for FormError {
    fn from(err: FieldError) -> Self {
        FormError::validation(err.message)
    }
}

impl From<StoreError> for FormError {
    fn from(err: StoreError) -> Self {
        let (status, message) = match err {
            StoreError::NotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            StoreError::TableEmpty => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database file empty".to_string(),
            ),
            StoreError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "Database busy".to_string()),
            StoreError::Unavailable(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Cannot open database: {msg}"),
            ),
            StoreError::MissingColumn(col) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Table missing {col} column"),
            ),
            StoreError::EmailTaken => {
                (StatusCode::BAD_REQUEST, "Email already exists.".to_string())
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        Self { status, message }
    }
}

impl From<PhotoError> for FormError {
    fn from(err: PhotoError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for FormError {
    fn from(err: anyhow::Error) -> Self {
        FormError::internal(err.to_string())
    }
}
