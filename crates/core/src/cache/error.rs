use thiserror::Error;

/// Errors that can occur during cache operations.
///
/// Every variant means the shared store could not serve the request. The
/// coordinator never distinguishes between them: any store error switches the
/// call to a direct, uncoordinated fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
