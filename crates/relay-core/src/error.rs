//! Error types for the canonical codec and core types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while encoding or decoding canonical objects.
///
/// Every variant is fatal to the operation that produced it; nothing in the
/// codec retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete field could be read
    #[error("Unexpected end of input: needed {needed} more bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    /// Field appeared out of canonical order or twice
    #[error("Non-canonical field order: {field} after {previous}")]
    NonCanonicalOrder { previous: String, field: String },

    /// Type code is not one the codec understands
    #[error("Unknown type code {0}")]
    UnknownType(u16),

    /// Field header was malformed (zero codes, unused encodings)
    #[error("Invalid field header at offset {0}")]
    InvalidFieldHeader(usize),

    /// Objects and arrays nested past the decoder's limit
    #[error("Nesting deeper than {limit} levels at offset {offset}")]
    TooDeep { offset: usize, limit: usize },

    /// Variable-length prefix out of range
    #[error("Invalid length prefix: {0}")]
    InvalidLength(String),

    /// Amount was not a positive native amount
    #[error("Unsupported amount encoding: {0}")]
    UnsupportedAmount(String),

    /// A field was expected but absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field held a value of the wrong type
    #[error("Field {field} has unexpected type {found}")]
    WrongType { field: &'static str, found: &'static str },

    /// Invalid value for a field
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Account identifier could not be parsed
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Hex text could not be decoded
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for CodecError {
    fn from(e: hex::FromHexError) -> Self {
        CodecError::InvalidHex(e.to_string())
    }
}
