//! Classic base58 address codec
//!
//! Ledger identifiers are rendered as base58 using the ripple alphabet with a
//! one-byte version prefix and a four-byte double-SHA-256 checksum. The same
//! check encoding carries family seeds, which is why the helpers are public.

use sha2::{Digest, Sha256};

use crate::error::{CodecError, Result};
use crate::types::AccountId;

/// Version prefix for account identifiers
pub const ACCOUNT_ID_VERSION: &[u8] = &[0x00];

/// Version prefix for Ed25519 family seeds (`sEd...`)
pub const ED25519_SEED_VERSION: &[u8] = &[0x01, 0xE1, 0x4B];

fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Base58check-encode `payload` under `version`
pub fn encode_check(version: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(version.len() + payload.len() + 4);
    data.extend_from_slice(version);
    data.extend_from_slice(payload);
    let sum = checksum(&data);
    data.extend_from_slice(&sum);
    bs58::encode(data).with_alphabet(bs58::Alphabet::RIPPLE).into_string()
}

/// Decode base58check text, verifying version, payload length and checksum
pub fn decode_check(text: &str, version: &[u8], payload_len: usize) -> Result<Vec<u8>> {
    let data = bs58::decode(text)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .map_err(|e| CodecError::InvalidAccount(format!("{}: {}", text, e)))?;

    if data.len() != version.len() + payload_len + 4 {
        return Err(CodecError::InvalidAccount(format!(
            "{}: decoded length {} does not match expected {}",
            text,
            data.len(),
            version.len() + payload_len + 4
        )));
    }

    let (body, sum) = data.split_at(data.len() - 4);
    if checksum(body) != sum {
        return Err(CodecError::InvalidAccount(format!("{}: checksum mismatch", text)));
    }
    if &body[..version.len()] != version {
        return Err(CodecError::InvalidAccount(format!("{}: unexpected version prefix", text)));
    }

    Ok(body[version.len()..].to_vec())
}

/// Encode an account identifier as a classic address
pub fn encode_account(account: &AccountId) -> String {
    encode_check(ACCOUNT_ID_VERSION, account.as_bytes())
}

/// Decode a classic address into an account identifier
pub fn decode_account(text: &str) -> Result<AccountId> {
    let payload = decode_check(text, ACCOUNT_ID_VERSION, AccountId::LEN)?;
    AccountId::from_slice(&payload)
}
