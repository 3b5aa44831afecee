//! Signing and verification over arbitrary bytes

use ed25519_dalek::{Signer, Verifier};
use crate::error::{CryptoError, Result};
use crate::keys::{KeyPair, PublicKey};

/// Ed25519 signature length
pub const SIGNATURE_LEN: usize = 64;

/// Detached Ed25519 signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature(format!("expected 64 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Sign `message`. Ed25519 signatures are deterministic.
pub fn sign(message: &[u8], key_pair: &KeyPair) -> Signature {
    Signature(key_pair.signing_key().sign(message).to_bytes())
}

/// Verify `signature` over `message`
pub fn verify(message: &[u8], signature: &Signature, public_key: &PublicKey) -> Result<()> {
    let key = public_key.verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerification)
}

/// Verify raw envelope fields: 64-byte signature and `ED`-prefixed key
pub fn verify_bytes(message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
    let public_key = PublicKey::from_prefixed(public_key)?;
    let signature = Signature::from_slice(signature)?;
    verify(message, &signature, &public_key)
}

/// Boolean form of [`verify`]
pub fn is_valid(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    verify(message, signature, public_key).is_ok()
}
