//! Helix client error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, HelixError>;

/// Errors returned by the Helix client.
#[derive(Error, Debug)]
pub enum HelixError {
    /// The client-credentials exchange was rejected.
    #[error("App token exchange failed with status {status}")]
    AuthFailed { status: u16 },

    /// A request failed at the transport level (DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API returned a non-success status the caller must handle.
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// A response body did not match the expected shape.
    #[error("Failed to decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    /// More names were passed to a batched lookup than one call permits.
    #[error("Batch of {0} names exceeds the per-call limit of {MAX_LOOKUP_BATCH}", MAX_LOOKUP_BATCH = crate::client::MAX_LOOKUP_BATCH)]
    BatchTooLarge(usize),
}

impl HelixError {
    pub(crate) fn decode(endpoint: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint,
            message: err.to_string(),
        }
    }
}
