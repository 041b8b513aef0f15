//! Error types and result aliases for harrow.
//!
//! "Not found" is not an error in this crate: lookups return `Option` and
//! idempotent deletions report absence through their return value. The error
//! channel is reserved for genuine faults.

/// The result type used throughout harrow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in harrow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided. Raised before any I/O is attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A namespace operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A file relocation failed.
    #[error("failed to move {from} to {to}")]
    MoveFailed {
        /// Source path of the failed move.
        from: String,
        /// Target path of the failed move.
        to: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
