//! Error types for clubhub.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    // === Client Errors ===
    /// A record does not exist or is not visible to the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or rejected credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// The caller's role may not use this endpoint.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The backend refused an action on policy grounds. The message is the
    /// backend's own wording and is rendered untouched.
    #[error("{0}")]
    PolicyRejected(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A request field failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    // === Server Errors ===
    /// The club backend failed or returned something unreadable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::PolicyRejected(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,

            // 5xx Server Errors
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::PolicyRejected(_) => "POLICY_REJECTED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejection_message_is_verbatim() {
        let err = AppError::PolicyRejected("Club is locked until issues are resolved".to_string());
        assert_eq!(err.to_string(), "Club is locked until issues are resolved");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "POLICY_REJECTED");
    }

    #[test]
    fn test_upstream_is_server_error() {
        assert!(AppError::Upstream("connection refused".to_string()).is_server_error());
        assert!(!AppError::Unauthorized.is_server_error());
    }
}
