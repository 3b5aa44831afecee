//! Relay client error types

use relay_core::{CodecError, Hash256};
use relay_crypto::CryptoError;
use relay_protocol::ProtocolError;
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors surfaced by the relay client.
///
/// Nothing here is retried automatically. A safe retry needs a fresh
/// sequence, so the decision belongs to the caller.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Network refused the carrier transaction
    #[error("Submission rejected: {code}: {message}")]
    SubmissionRejected { code: String, message: String },

    /// Ledger passed the validity window without a validated result
    #[error("Confirmation timeout: {tx_id} not validated by ledger {last_ledger}")]
    ConfirmationTimeout { tx_id: Hash256, last_ledger: u32 },

    /// Caller deadline expired while waiting
    #[error("Timed out waiting for {0}")]
    TimedOut(Hash256),

    /// Connection or HTTP failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Ledger answered with an error or an unexpected shape
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Serialization error: {0}")]
    Codec(#[from] CodecError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(e: config::ConfigError) -> Self {
        RelayError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_verbatim() {
        let err = RelayError::SubmissionRejected {
            code: "tefPAST_SEQ".to_string(),
            message: "This sequence number has already passed.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Submission rejected: tefPAST_SEQ: This sequence number has already passed."
        );
    }
}
