//! Error types for backend calls.

use thiserror::Error;

/// Errors reported by the persistence backend or the transport in front of it.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Request never produced a usable response (connection, timeout, status)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with an `{ "error": ... }` payload
    #[error("Server error: {message}")]
    Server {
        /// Message from the backend
        message: String,
    },

    /// Backend answered `success: false`
    #[error("Request rejected: {message}")]
    Rejected {
        /// Message from the backend
        message: String,
    },

    /// Response body was not valid JSON for the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a transport error with a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a server error with a message.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create a rejection error with a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
