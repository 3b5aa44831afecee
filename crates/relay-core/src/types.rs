//! Core type definitions shared by the relay crates

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::address;
use crate::error::{CodecError, Result};

/// Virtual actor tag
pub type Tag = u32;

/// AccountId - 20-byte ledger account identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// Length of an account identifier in bytes
    pub const LEN: usize = 20;

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidAccount(format!("expected 20 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Encode as a classic base58 address (`r...`)
    pub fn to_address(&self) -> String {
        address::encode_account(self)
    }
}

impl FromStr for AccountId {
    type Err = CodecError;

    /// Accepts a classic address or 40 hex characters
    fn from_str(s: &str) -> Result<Self> {
        if s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(s)?;
            return Self::from_slice(&bytes);
        }
        address::decode_account(s)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_address())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_address())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash256 - 32-byte hash (transaction ids, keylets, invoice ids)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CodecError::InvalidValue {
            field: "Hash256",
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Uppercase hex, the form ledgers print hashes in
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s)?)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Drops - native currency amount in the smallest unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Drops(pub u64);

impl Drops {
    /// Drops per whole unit of native currency
    pub const PER_UNIT: u64 = 1_000_000;

    /// Largest amount the native encoding can carry
    pub const MAX: u64 = 100_000_000_000 * Self::PER_UNIT;

    pub fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(Self::PER_UNIT))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} drops", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_hex_roundtrip() {
        let account = AccountId::new([7u8; 20]);
        let parsed: AccountId = account.to_hex().parse().unwrap();
        assert_eq!(account, parsed);
    }

    #[test]
    fn test_account_id_wrong_length() {
        assert!(AccountId::from_slice(&[0u8; 19]).is_err());
    }

    #[test]
    fn test_hash256_hex() {
        let hash = Hash256::new([0xAB; 32]);
        assert_eq!(hash.to_hex(), "AB".repeat(32));
        assert_eq!(Hash256::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(Hash256::from_hex("ABCD").is_err());
    }

    #[test]
    fn test_drops_units() {
        assert_eq!(Drops::from_units(3).get(), 3_000_000);
    }
}
