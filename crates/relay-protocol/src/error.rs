//! Protocol error types

use relay_core::CodecError;
use relay_crypto::CryptoError;
use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building, transporting or reading relayed instructions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Record or transaction could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// Key or signature problem
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Memo slot absent from the carrier
    #[error("Missing memo slot: {0}")]
    MissingMemo(&'static str),

    /// Memo slot present more than once
    #[error("Duplicate memo slot: {0}")]
    DuplicateMemo(&'static str),

    /// Memo field could not be normalized
    #[error("Invalid memo field: {0}")]
    InvalidMemo(String),

    /// State slot held bytes of the wrong shape
    #[error("Invalid state for {slot}: {reason}")]
    InvalidState { slot: String, reason: String },

    /// Tag outside the allocatable range
    #[error("Invalid tag: {0}")]
    InvalidTag(u32),

    /// Carrier transaction is malformed
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}
