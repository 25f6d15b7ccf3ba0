use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
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

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::NotAuthenticated(truncated),
            403 => ApiError::AccessDenied(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(_) | ApiError::NotAuthenticated(_) | ApiError::AccessDenied(_) => {
                AuthError::Credential(err.to_string())
            }
            ApiError::NetworkError(ref e) if e.is_timeout() => AuthError::Timeout,
            ApiError::NetworkError(ref e) if e.is_decode() => {
                AuthError::InvalidResponse(e.to_string())
            }
            ApiError::NetworkError(_) | ApiError::ServerError(_) => {
                AuthError::Transport(err.to_string())
            }
            ApiError::InvalidResponse(message) => AuthError::InvalidResponse(message),
        }
    }
}
