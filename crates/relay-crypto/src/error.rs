//! Cryptographic error types

use thiserror::Error;

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors in cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key bytes or text could not be parsed
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// Signature bytes are malformed
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature does not match message and key
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Seed uses a key family this crate does not support
    #[error("Unsupported seed: {0}")]
    UnsupportedSeed(String),
}

impl From<relay_core::CodecError> for CryptoError {
    fn from(e: relay_core::CodecError) -> Self {
        CryptoError::KeyFormat(e.to_string())
    }
}
