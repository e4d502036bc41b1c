//! Transport error types

use crate::HttpResponse;
use crate::rate_limit::RateLimitState;

/// Errors surfaced by transports and their configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected client configuration. Displays the bare message.
    #[error("{0}")]
    InvalidConfig(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, TLS, timeout or body read failure.
    #[error("HTTP request failed: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Still receiving 429 after every configured retry.
    #[error("rate limited: still receiving 429 after {attempts} attempts")]
    RateLimited {
        state: RateLimitState,
        response: Box<HttpResponse>,
        attempts: u32,
    },

    #[error("dispatcher shut down")]
    DispatcherClosed,
}

impl Error {
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Error::Io {
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
