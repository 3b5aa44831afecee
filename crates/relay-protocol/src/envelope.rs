//! Signed envelopes

use relay_core::instruction::{InstructionKind, InstructionRecord};
use relay_crypto::{sign, verify_bytes, KeyPair, PublicKey};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Payload bytes with the signature and key that authorize them.
///
/// The module is the party that must check the signature before honoring the
/// payload. [`SignedEnvelope::verify`] lets a client check it too.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// Canonical record bytes
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,

    /// Signature over `payload`
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,

    /// `ED`-prefixed signer key
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

impl SignedEnvelope {
    /// Sign already-serialized payload bytes
    pub fn sign_bytes(payload: Vec<u8>, key_pair: &KeyPair) -> Self {
        let signature = sign(&payload, key_pair).to_vec();
        Self {
            payload,
            signature,
            public_key: key_pair.public_key().to_prefixed(),
        }
    }

    /// Serialize `record` and sign its canonical bytes
    pub fn sign_record(record: &InstructionRecord, key_pair: &KeyPair) -> Result<Self> {
        Ok(Self::sign_bytes(record.to_bytes()?, key_pair))
    }

    /// Check the signature against the payload and the carried key
    pub fn verify(&self) -> Result<()> {
        verify_bytes(&self.payload, &self.signature, &self.public_key)?;
        Ok(())
    }

    pub fn signer(&self) -> Result<PublicKey> {
        Ok(PublicKey::from_prefixed(&self.public_key)?)
    }

    /// Decode the payload as a record of `kind`
    pub fn record(&self, kind: InstructionKind) -> Result<InstructionRecord> {
        Ok(InstructionRecord::from_bytes(kind, &self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use relay_core::instruction::{ListOperation, ListUpdate};
    use relay_core::AccountId;
    use relay_crypto::CryptoError;

    fn list_update() -> InstructionRecord {
        ListUpdate {
            sequence: 1_700_000_000,
            operation: ListOperation::Add,
            accounts: vec![AccountId::new([0x5A; 20])],
        }
        .into()
    }

    #[test]
    fn test_sign_and_verify() {
        let pair = KeyPair::generate();
        let envelope = SignedEnvelope::sign_record(&list_update(), &pair).unwrap();
        envelope.verify().unwrap();
        assert_eq!(envelope.signer().unwrap(), *pair.public_key());
        assert_eq!(envelope.record(InstructionKind::ListUpdate).unwrap(), list_update());
    }

    #[test]
    fn test_tampered_payload() {
        let pair = KeyPair::generate();
        let mut envelope = SignedEnvelope::sign_record(&list_update(), &pair).unwrap();
        let last = envelope.payload.len() - 2;
        envelope.payload[last] ^= 1;
        assert_eq!(
            envelope.verify(),
            Err(ProtocolError::Crypto(CryptoError::SignatureVerification))
        );
    }

    #[test]
    fn test_json_is_hex() {
        let pair = KeyPair::generate();
        let envelope = SignedEnvelope::sign_bytes(vec![0xAB, 0xCD], &pair);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"], "abcd");
        let back: SignedEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }
}
