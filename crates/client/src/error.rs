//! Backend client errors.

use clubhub_common::AppError;
use reqwest::StatusCode;

/// Error type for backend client operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport failure, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The base URL or a request path could not be joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Non-success status, with the backend's message.
    #[error("Backend responded {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Message extracted from the response body.
        message: String,
    },
    /// The body was not the expected JSON.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, message } => match status {
                StatusCode::UNAUTHORIZED => Self::Unauthorized,
                // Enforcement refusals keep the backend's wording.
                StatusCode::FORBIDDEN => Self::PolicyRejected(message),
                StatusCode::NOT_FOUND => Self::NotFound(message),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Self::BadRequest(message)
                }
                status => Self::Upstream(format!("backend responded {status}: {message}")),
            },
            BackendError::InvalidUrl(url) => Self::Config(format!("invalid backend URL: {url}")),
            BackendError::Http(e) => Self::Upstream(e.to_string()),
            BackendError::Decode(e) => Self::Upstream(e),
        }
    }
}

/// Human-readable message from an error response body.
///
/// Understands `{"message"}`, `{"error": "..."}`, `{"error": {"message"}}` and
/// `{"detail"}`, and falls back to the raw text.
#[must_use]
pub fn extract_message(body: &str, status: StatusCode) -> String {
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    };

    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback();
    };

    let candidates = [
        json.get("message"),
        json.get("error").filter(|e| e.is_string()),
        json.get("error").and_then(|e| e.get("message")),
        json.get("detail"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_shapes() {
        let status = StatusCode::FORBIDDEN;
        assert_eq!(extract_message(r#"{"message":"Club is locked"}"#, status), "Club is locked");
        assert_eq!(extract_message(r#"{"error":"Club is locked"}"#, status), "Club is locked");
        assert_eq!(
            extract_message(r#"{"error":{"code":"LOCKED","message":"Club is locked"}}"#, status),
            "Club is locked"
        );
        assert_eq!(extract_message(r#"{"detail":"Club is locked"}"#, status), "Club is locked");
        assert_eq!(extract_message("Club is locked\n", status), "Club is locked");
        assert_eq!(extract_message("", status), "Forbidden");
    }

    #[test]
    fn test_status_mapping() {
        let forbidden = BackendError::Status {
            status: StatusCode::FORBIDDEN,
            message: "Publishing is disabled while the club is locked".to_string(),
        };
        assert_eq!(
            AppError::from(forbidden),
            AppError::PolicyRejected("Publishing is disabled while the club is locked".to_string())
        );

        let unavailable = BackendError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "maintenance".to_string(),
        };
        assert!(matches!(AppError::from(unavailable), AppError::Upstream(_)));

        let unauthorized = BackendError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: String::new(),
        };
        assert_eq!(AppError::from(unauthorized), AppError::Unauthorized);
    }
}
