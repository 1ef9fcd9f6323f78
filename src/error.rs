// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request is missing required data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication failed (bad credentials, missing or invalid token)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Authenticated, but not allowed to touch this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown strain, comment, or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body failed validation
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        location: Option<String>,
    },

    /// SQLite failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Validation failure tied to a request field
    pub fn invalid(message: impl Into<String>, location: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (reason, message, location) = match self {
            ApiError::BadRequest(msg) => ("BadRequest", msg, None),
            ApiError::AuthError(msg) => ("AuthError", msg, None),
            ApiError::Forbidden(msg) => ("Forbidden", msg, None),
            ApiError::NotFound(msg) => ("NotFound", msg, None),
            ApiError::ValidationError { message, location } => {
                ("ValidationError", message, location)
            }
            ApiError::Storage(err) => {
                tracing::error!("Storage error: {:?}", err);
                ("InternalError", "Internal server error".to_string(), None)
            }
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                ("InternalError", "Internal server error".to_string(), None)
            }
        };

        let mut body = json!({
            "code": status.as_u16(),
            "reason": reason,
            "message": message,
        });
        if let Some(location) = location {
            body["location"] = json!(location);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
