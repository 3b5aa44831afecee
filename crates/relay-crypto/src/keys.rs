//! Ed25519 key material
//!
//! Public keys travel as 33 bytes: `0xED` followed by the 32-byte key. Secret
//! keys are held only inside [`KeyPair`], zeroized on drop and never printed.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use relay_core::address::{decode_check, ED25519_SEED_VERSION};
use relay_core::instruction::{ED25519_KEY_PREFIX, PREFIXED_KEY_LEN};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::hash::sha512_half;

/// Entropy length of a family seed
pub const SEED_ENTROPY_LEN: usize = 16;

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Parse a raw 32-byte key
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyFormat(format!("expected 32 raw bytes, got {}", bytes.len())))?;
        VerifyingKey::from_bytes(&arr).map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Parse the 33-byte `ED`-prefixed form
    pub fn from_prefixed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PREFIXED_KEY_LEN || bytes[0] != ED25519_KEY_PREFIX {
            return Err(CryptoError::KeyFormat(format!(
                "expected {} bytes starting with ED, got {}",
                PREFIXED_KEY_LEN,
                bytes.len()
            )));
        }
        Self::from_raw(&bytes[1..])
    }

    /// The 32-byte key without prefix
    pub fn raw(&self) -> &[u8; 32] {
        &self.0
    }

    /// The 33-byte prefixed form
    pub fn to_prefixed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREFIXED_KEY_LEN);
        out.push(ED25519_KEY_PREFIX);
        out.extend_from_slice(&self.0);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_prefixed())
    }

    pub(crate) fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| CryptoError::KeyFormat(e.to_string()))
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    /// Accepts 66 hex characters (`ED`-prefixed) or 64 (raw)
    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
        match bytes.len() {
            PREFIXED_KEY_LEN => Self::from_prefixed(&bytes),
            _ => Self::from_raw(&bytes),
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Secret key bytes, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretBytes([u8; 32]);

/// Ed25519 key pair
pub struct KeyPair {
    secret: SecretBytes,
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let pair = Self::from_secret_bytes(secret);
        secret.zeroize();
        pair
    }

    fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key = PublicKey(signing_key.verifying_key().to_bytes());
        Self {
            secret: SecretBytes(secret),
            signing_key,
            public_key,
        }
    }

    /// Build from a 32-byte secret, optionally `ED`-prefixed (33 bytes)
    pub fn from_secret(bytes: &[u8]) -> Result<Self> {
        let raw = match bytes.len() {
            32 => bytes,
            33 if bytes[0] == ED25519_KEY_PREFIX => &bytes[1..],
            n => return Err(CryptoError::KeyFormat(format!("secret key of {} bytes", n))),
        };
        let mut secret = [0u8; 32];
        secret.copy_from_slice(raw);
        let pair = Self::from_secret_bytes(secret);
        secret.zeroize();
        Ok(pair)
    }

    /// Derive from 16 bytes of seed entropy: secret = SHA-512-half(entropy)
    pub fn from_entropy(entropy: &[u8; SEED_ENTROPY_LEN]) -> Self {
        let mut secret = *sha512_half(entropy).as_bytes();
        let pair = Self::from_secret_bytes(secret);
        secret.zeroize();
        pair
    }

    /// Decode an Ed25519 family seed (`sEd...`)
    pub fn from_seed(seed: &str) -> Result<Self> {
        if !seed.starts_with("sEd") {
            return Err(CryptoError::UnsupportedSeed(
                "only Ed25519 family seeds are supported".to_string(),
            ));
        }
        let mut entropy = decode_check(seed, ED25519_SEED_VERSION, SEED_ENTROPY_LEN)?;
        let mut arr = [0u8; SEED_ENTROPY_LEN];
        arr.copy_from_slice(&entropy);
        entropy.zeroize();
        let pair = Self::from_entropy(&arr);
        arr.zeroize();
        Ok(pair)
    }

    /// Parse whatever form a caller configured: family seed or hex secret
    pub fn from_secret_text(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.starts_with('s') {
            return Self::from_seed(text);
        }
        let mut bytes = hex::decode(text).map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
        let pair = Self::from_secret(&bytes);
        bytes.zeroize();
        pair
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// `ED`-prefixed hex secret, for writing to a key file
    pub fn secret_hex(&self) -> String {
        format!("ED{}", hex::encode_upper(self.secret.0))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
