//! Error types and handling for the block-document engine
//!
//! Engine errors follow a small taxonomy: lookups that miss are `NotFound`,
//! structural rule breaks are `InvariantViolation`, and anything raised by a
//! persistence backend travels unchanged inside `Storage`.

use thiserror::Error;

/// Result of engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by persistence backends
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Engine error
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or unreadable configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage layer errors, propagated unchanged
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Document, block or block version does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A structural rule of the document model was broken
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A document id is already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Caller-supplied argument rejected before touching storage
    #[error("Invalid argument: {0}")]
    InvalidInput(String),

    /// JSON encoding outside the storage layer
    #[error("JSON encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local filesystem access outside the storage layer
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Metric registration failed
    #[error("Metric registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Error raised by a persistence backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend rejected or failed the operation
    #[error("Backend failure: {0}")]
    Backend(String),

    /// File store read or write failed
    #[error("Disk access failed: {0}")]
    DiskIo(#[from] std::io::Error),

    /// Stored entity or file layout is not what the backend wrote
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Entity could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<crate::core::sort_key::SortKeyError> for Error {
    fn from(err: crate::core::sort_key::SortKeyError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl Error {
    /// `Config` with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `NotFound` naming the missing entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    /// `InvariantViolation` with a message
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// `AlreadyExists` naming the entity
    pub fn already_exists(entity: impl Into<String>) -> Self {
        Self::AlreadyExists(entity.into())
    }

    /// `InvalidInput` with a message
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Missing document, block or version
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Broken document-model rule
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }

    /// Whether re-invoking the operation might succeed. The engine itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Storage(StorageError::DiskIo(_)) | Error::Storage(StorageError::Backend(_))
        )
    }

    /// Caused by the request rather than the environment
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::InvariantViolation(_)
        )
    }

    /// Caused by the backend or the host
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) | Error::Metrics(_)
        )
    }
}
