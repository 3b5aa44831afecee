//! # Relay Cryptography
//!
//! Primitives for authorizing relayed instructions:
//! - Ed25519 key pairs with zeroized secrets and family-seed decoding
//! - Deterministic signing and verification over canonical bytes
//! - SHA-512-half hashing with ledger hash prefixes
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Signatures | Ed25519 |
//! | Object ids | SHA-512, first 256 bits |

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::*;
pub use hash::*;
pub use keys::*;
pub use sign::*;

/// Cryptographic prelude
pub mod prelude {
    pub use crate::error::{CryptoError, Result};
    pub use crate::hash::{prefixed_hash, sha512_half, HashPrefix};
    pub use crate::keys::{KeyPair, PublicKey};
    pub use crate::sign::{sign, verify, Signature};
}
