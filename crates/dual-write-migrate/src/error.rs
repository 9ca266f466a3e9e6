//! Error types for the dual-write migration library.

use thiserror::Error;

/// Boxed driver error, kept dynamic so any store driver can plug in.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for dual-write operations.
#[derive(Error, Debug)]
pub enum DualWriteError {
    /// Configuration error (invalid YAML, out-of-range settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pattern value this library does not recognize.
    ///
    /// Returned instead of silently routing to either store when the live
    /// pattern cannot be decoded or an update names an unknown phase.
    #[error("Unknown dual-write pattern: {0}")]
    UnknownPattern(String),

    /// Prepared statements have no dual-store semantic and are rejected.
    #[error("Prepared statements are not supported by the dual-write proxy")]
    PrepareUnsupported,

    /// Error surfaced by the underlying store driver.
    #[error("Store driver error: {0}")]
    Driver(#[source] BoxDynError),

    /// A row could not be decoded into the entity type.
    #[error("Row decode error: {0}")]
    Decode(String),

    /// A single query exceeded its deadline.
    #[error("Query timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The surrounding execution context was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DualWriteError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        DualWriteError::Config(message.into())
    }

    /// Wrap a driver-native error.
    pub fn driver(err: impl Into<BoxDynError>) -> Self {
        DualWriteError::Driver(err.into())
    }

    /// Create a Decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        DualWriteError::Decode(message.into())
    }

    /// Whether this error means the caller's context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DualWriteError::Cancelled)
    }
}

/// Result type alias for dual-write operations.
pub type Result<T> = std::result::Result<T, DualWriteError>;
