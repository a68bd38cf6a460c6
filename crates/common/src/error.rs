//! Error types for Fetchkit

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using Fetchkit Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fetchkit error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { message: String, status: Option<u16> },
}

impl Error {
    /// Wrap a request failure with a caller-facing message, keeping the
    /// HTTP status when the server answered.
    pub fn api(message: impl Into<String>, source: &Error) -> Self {
        Error::Api {
            message: message.into(),
            status: source.status(),
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failure recorded in a request's state.
///
/// Only the error of the currently active attempt is ever stored; failures
/// of superseded attempts are dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The server answered with a status outside 200..=299
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// The timer fired before the transport settled
    #[error("Request timed out")]
    Timeout,

    /// Transport-level failure (DNS, refused connection, TLS, reset)
    #[error("{cause}")]
    Network { cause: String },

    /// The body could not be decoded into the expected type
    #[error("{cause}")]
    Decode { cause: String },

    /// The attempt failed in a way the hook does not recognise
    #[error("Unknown error occurred")]
    Unknown,
}

impl FetchError {
    pub fn network(cause: impl std::fmt::Display) -> Self {
        FetchError::Network {
            cause: cause.to_string(),
        }
    }

    pub fn decode(cause: impl std::fmt::Display) -> Self {
        FetchError::Decode {
            cause: cause.to_string(),
        }
    }
}

/// Errors an [`HttpClient`](crate::HttpClient) implementation may surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request observed its cancellation token and stopped
    #[error("The operation was aborted")]
    Aborted,

    #[error("{0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e.to_string())
    }
}
