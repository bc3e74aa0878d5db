//! Remote store error handling
//!
//! Classifies failed requests so callers can tell an expired session (sign
//! out) apart from everything else (retry or roll back).

use thiserror::Error;

/// Errors that can occur talking to the remote task store
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The store answered with a non-success status
    #[error("Remote store returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    /// The request could not complete
    #[error("Request to remote store failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not JSON
    #[error("Unexpected response from remote store: {0}")]
    Decode(String),

    /// The configured endpoint cannot be used as a base URL
    #[error("Invalid API endpoint '{0}'")]
    InvalidEndpoint(String),
}

impl RemoteError {
    /// Whether the failure means the session is missing or expired
    pub fn is_auth_failure(&self) -> bool {
        match self {
            RemoteError::Remote { status, message } => {
                *status == 401 || message.to_lowercase().contains("expired")
            }
            _ => false,
        }
    }

    /// Whether the request never got an answer
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }

    /// HTTP status, if the store answered
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: u16, message: &str) -> RemoteError {
        RemoteError::Remote {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_unauthorized_is_auth_failure() {
        assert!(remote(401, "Unauthorized").is_auth_failure());
    }

    #[test]
    fn test_expired_message_is_auth_failure() {
        assert!(remote(403, "The incoming token has EXPIRED").is_auth_failure());
    }

    #[test]
    fn test_other_failures() {
        let err = remote(500, "Internal server error");
        assert!(!err.is_auth_failure());
        assert!(!err.is_network());
        assert_eq!(err.status(), Some(500));

        let decode = RemoteError::Decode("expected value".to_string());
        assert!(!decode.is_auth_failure());
        assert_eq!(decode.status(), None);
    }

    #[test]
    fn test_error_display() {
        let msg = remote(502, "Bad gateway").to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("Bad gateway"));
    }
}
