//! Backend error types

use thiserror::Error;

/// Errors raised by a [`BackendClient`](super::BackendClient)
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for BackendError {
    fn from(err: url::ParseError) -> Self {
        BackendError::InvalidEndpoint(err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = BackendError::Status {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned status 409: duplicate key");
    }

    #[test]
    fn test_url_error_conversion() {
        let err: BackendError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, BackendError::InvalidEndpoint(_)));
    }
}
