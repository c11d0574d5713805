use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::ValidationError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to encrypt access token or refresh token")]
    Encryption,

    #[error("Session expired - no refresh token available")]
    SessionExpired,

    #[error("{0}")]
    RefreshFailed(String),

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist credentials: {0}")]
    Storage(#[from] StorageError),
}

/// Maximum length for error response bodies in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The `message` field of a JSON error body, if there is a non-empty one.
    pub(crate) fn server_message(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }

    /// Build an error for a non-2xx response: the server's message when it
    /// sent one, otherwise the status code.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        ApiError::Http { status, message }
    }

    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Whether this error ended the session (credentials were cleared).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::RefreshFailed(_))
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            ApiError::Transport(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
            ApiError::Transport(e) if e.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Encryption => ApiError::Encryption,
            AuthError::Storage(e) => ApiError::Storage(e),
        }
    }
}
