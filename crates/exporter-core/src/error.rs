//! Error handling for the exporter
//!
//! Provides the error type shared by the correlation engine and the collaborator traits.

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the exporter core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// The device-allocation API could not be queried
    #[error("Device allocation error: {0}")]
    Allocation(String),

    /// Workload labels could not be resolved
    #[error("Label resolution error: {0}")]
    LabelResolution(String),

    /// Device registry could not be fetched or decoded
    #[error("Device registry error: {0}")]
    Registry(String),

    /// Workload or device not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The pass deadline expired before a collaborator answered
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a device allocation error
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Create a label resolution error
    pub fn label_resolution(msg: impl Into<String>) -> Self {
        Self::LabelResolution(msg.into())
    }

    /// Create a device registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a deadline exceeded error
    pub fn deadline_exceeded(msg: impl Into<String>) -> Self {
        Self::DeadlineExceeded(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Errors that only degrade the current collection pass.
    ///
    /// Everything else is expected to surface during startup.
    pub fn is_pass_local(&self) -> bool {
        matches!(
            self,
            Error::Allocation(_)
                | Error::LabelResolution(_)
                | Error::NotFound(_)
                | Error::DeadlineExceeded(_)
        )
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::Allocation(_) => "allocation",
            Error::LabelResolution(_) => "label_resolution",
            Error::Registry(_) => "registry",
            Error::NotFound(_) => "not_found",
            Error::DeadlineExceeded(_) => "deadline_exceeded",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Other(_) => "other",
        }
    }
}
