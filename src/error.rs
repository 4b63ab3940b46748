use thiserror::Error;

/// Main error type for Docadvisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Upload declared an extension outside the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Payload could not be decoded for its declared format
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    /// Upload exceeds the configured byte limit
    #[error("File too large: {size} bytes exceeds limit of {limit}")]
    Oversize { size: usize, limit: usize },

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(u64),

    /// Generation service errors. Absorbed by the gateway and converted to a
    /// fallback reply; never surfaced to callers.
    #[error("Generation service error: {0}")]
    Generation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type using AdvisorError
pub type Result<T> = std::result::Result<T, AdvisorError>;
