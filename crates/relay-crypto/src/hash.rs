//! SHA-512-half hashing and ledger hash prefixes
//!
//! The ledger identifies objects by the first 256 bits of a SHA-512 digest,
//! with a 4-byte prefix naming what was hashed.

use relay_core::Hash256;
use sha2::{Digest, Sha512};

/// 4-byte domain prefixes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashPrefix {
    /// `STX\0`: single-signed transaction signing data
    TransactionSign,
    /// `TXN\0`: transaction id
    TransactionId,
}

impl HashPrefix {
    pub fn bytes(self) -> [u8; 4] {
        match self {
            Self::TransactionSign => *b"STX\0",
            Self::TransactionId => *b"TXN\0",
        }
    }
}

/// First 32 bytes of SHA-512
pub fn sha512_half(data: &[u8]) -> Hash256 {
    sha512_half_concat(&[data])
}

/// SHA-512-half over several items
pub fn sha512_half_concat(items: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha512::new();
    for item in items {
        hasher.update(item);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Hash256::new(out)
}

/// SHA-512-half of `prefix ‖ data`
pub fn prefixed_hash(prefix: HashPrefix, data: &[u8]) -> Hash256 {
    sha512_half_concat(&[&prefix.bytes(), data])
}
