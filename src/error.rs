//! Error types
//!
//! The client distinguishes four failure classes:
//!
//! - **AuthRejected**: the backend answered 401. Handled globally by
//!   [`ApiClient`](crate::http::ApiClient): the session is cleared and the
//!   navigator is sent to the login route before the error reaches the caller.
//! - **Http**: any other non-2xx response, carrying the backend's `detail`
//!   message for inline display.
//! - **Transport / Decode**: network failures and unreadable bodies.
//! - Malformed live feed frames never surface as errors; see [`crate::feed`].

use reqwest::StatusCode;
use thiserror::Error;

/// Non-2xx response from the REST API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {detail}")]
pub struct HttpError {
    pub status: StatusCode,
    pub detail: String,
}

impl HttpError {
    /// 4xx responses are validation failures the user can correct
    pub fn is_validation(&self) -> bool {
        self.status.is_client_error()
    }
}

/// Session storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Refusing to store an empty token")]
    EmptyToken,
}

/// Errors returned by the REST client and resource services
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Session rejected by server, please log in again")]
    AuthRejected,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Message suitable for an inline error banner
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http(e) => e.detail.clone(),
            ClientError::AuthRejected => "Your session has expired. Please log in again.".to_string(),
            _ => "Request failed. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = HttpError {
            status: StatusCode::BAD_REQUEST,
            detail: "Email already registered".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: Email already registered");
        assert!(err.is_validation());
    }

    #[test]
    fn test_user_message() {
        let err = ClientError::Http(HttpError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: "password too short".to_string(),
        });
        assert_eq!(err.user_message(), "password too short");

        let err = ClientError::Config("bad".into());
        assert_eq!(err.user_message(), "Request failed. Please try again.");
    }
}
