//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or producing wire structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Hashed identity bytes could not be parsed
    #[error("corrupt identity: {reason}")]
    CorruptIdentity {
        /// What was wrong with the bytes
        reason: String,
    },

    /// CBOR serialization failed
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// Envelope exceeds the configured size limit
    #[error("envelope too large: {size} bytes exceeds maximum {max}")]
    EnvelopeTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Envelope version is not understood
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// A fixed-size or required field is malformed
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Wire name of the field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn field_length(field: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidField {
            field,
            reason: format!("expected {expected} bytes, got {actual}"),
        }
    }
}
