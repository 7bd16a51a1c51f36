//! Rate API client errors.

use thiserror::Error;

/// Result type alias for the rate API client.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur talking to the rate API.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    ServerError { status: u16, message: String },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Request(err) if err.is_timeout())
    }
}
