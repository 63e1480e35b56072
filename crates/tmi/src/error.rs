//! Chat client error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, TmiError>;

/// Errors that can occur while talking to the chat service.
#[derive(Error, Debug)]
pub enum TmiError {
    /// Connection-level errors (socket closed, handshake rejected)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Login rejected by the server
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed server line
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// WebSocket transport errors
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl TmiError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
