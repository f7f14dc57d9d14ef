//! Error types for the particle cache library.

use std::path::PathBuf;
use thiserror::Error;

use super::AttributeType;

/// Main error type for store and codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Signature/magic check failed - the file is not this format
    #[error("Not a {format} file: {reason}")]
    FormatMismatch {
        format: &'static str,
        reason: String,
    },

    /// No codec is registered for the filename extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Attribute name already registered in its class
    #[error("Duplicate attribute: {0}")]
    DuplicateAttribute(String),

    /// A required attribute is not present on the store
    #[error("Attribute not found: {0}")]
    MissingAttribute(String),

    /// Element type does not match the attribute's declared type
    #[error("Type mismatch for \"{name}\": expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: AttributeType,
        actual: String,
    },

    /// Particle or attribute index out of bounds
    #[error("Index {index} out of range (count: {count})")]
    OutOfRange { index: usize, count: usize },

    /// Internal consistency check failed while parsing
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// I/O error (open/read/write failure, truncated stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a corrupt-data error from a message.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptData(msg.into())
    }

    /// Create a format-mismatch error for the given format id.
    pub fn mismatch(format: &'static str, reason: impl Into<String>) -> Self {
        Self::FormatMismatch {
            format,
            reason: reason.into(),
        }
    }
}

/// Result type alias for store and codec operations.
pub type Result<T> = std::result::Result<T, Error>;
