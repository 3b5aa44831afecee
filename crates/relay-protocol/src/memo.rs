//! Memo transport
//!
//! A signed envelope rides on a carrier payment as three memos, one per field.
//! Each memo names its slot in `MemoFormat`, so receivers find slots by label
//! rather than position:
//!
//! | slot | MemoFormat | MemoType | MemoData |
//! |------|------------|----------|----------|
//! | payload | `signed/payload+1` | `<family>/payment` | canonical record |
//! | signature | `signed/signature+1` | `<family>/signature` | signature over payload |
//! | public key | `signed/publickey+1` | `<family>/publickey` | signer key |
//!
//! Unsigned proposals use a single `unsigned/payload+1` memo.

use relay_core::codec::{sf, FieldId, StObject, Value};
use serde::{Deserialize, Serialize};

use crate::envelope::SignedEnvelope;
use crate::error::{ProtocolError, Result};

pub const PAYLOAD_FORMAT: &str = "signed/payload+1";
pub const SIGNATURE_FORMAT: &str = "signed/signature+1";
pub const PUBLIC_KEY_FORMAT: &str = "signed/publickey+1";
pub const UNSIGNED_PAYLOAD_FORMAT: &str = "unsigned/payload+1";

/// Memo type family used by the lite account module
pub const DEFAULT_FAMILY: &str = "liteacc";

/// Memo type of a proposed notary transaction
pub const PROPOSAL_TYPE: &str = "notary/proposed";

/// Input for one memo field.
///
/// Callers say whether they hold bytes or hex text, so nothing is guessed from
/// the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoField {
    Raw(Vec<u8>),
    Hex(String),
}

impl MemoField {
    /// Legacy normalization: upper-case the text; if it is then all hex
    /// digits it is taken as hex, otherwise its UTF-8 bytes are used.
    ///
    /// Text that merely looks like hex (`"cafe"`) is read as hex.
    pub fn sniff(text: &str) -> Self {
        let upper = text.to_uppercase();
        if !upper.is_empty() && upper.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::Hex(upper)
        } else {
            Self::Raw(text.as_bytes().to_vec())
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Raw(bytes) => Ok(bytes),
            Self::Hex(text) => hex::decode(&text)
                .map_err(|e| ProtocolError::InvalidMemo(format!("{}: {}", text, e))),
        }
    }
}

impl From<&str> for MemoField {
    fn from(text: &str) -> Self {
        Self::Raw(text.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for MemoField {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

/// One memo
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Memo {
    pub memo_type: Vec<u8>,
    pub memo_format: Vec<u8>,
    pub memo_data: Vec<u8>,
}

impl Memo {
    pub fn new(
        memo_type: impl Into<MemoField>,
        memo_format: impl Into<MemoField>,
        memo_data: impl Into<MemoField>,
    ) -> Result<Self> {
        Ok(Self {
            memo_type: memo_type.into().into_bytes()?,
            memo_format: memo_format.into().into_bytes()?,
            memo_data: memo_data.into().into_bytes()?,
        })
    }

    /// Whether `MemoFormat` equals `label`
    pub fn has_format(&self, label: &str) -> bool {
        self.memo_format == label.as_bytes()
    }

    /// Wrapped `Memo` object for a `Memos` array
    pub fn to_object(&self) -> Result<StObject> {
        Ok(StObject::new()
            .with(sf::MEMO_TYPE, self.memo_type.clone())?
            .with(sf::MEMO_DATA, self.memo_data.clone())?
            .with(sf::MEMO_FORMAT, self.memo_format.clone())?)
    }

    /// Missing fields read as empty
    pub fn from_object(object: &StObject) -> Result<Self> {
        let field = |id: FieldId| -> Result<Vec<u8>> {
            if object.contains(id) {
                Ok(object.blob(id)?.to_vec())
            } else {
                Ok(Vec::new())
            }
        };
        Ok(Self {
            memo_type: field(sf::MEMO_TYPE)?,
            memo_format: field(sf::MEMO_FORMAT)?,
            memo_data: field(sf::MEMO_DATA)?,
        })
    }

    pub fn to_json(&self) -> MemoJson {
        MemoJson {
            memo: MemoFieldsJson {
                memo_type: hex::encode_upper(&self.memo_type),
                memo_format: hex::encode_upper(&self.memo_format),
                memo_data: hex::encode_upper(&self.memo_data),
            },
        }
    }

    pub fn from_json(json: &MemoJson) -> Result<Self> {
        let decode = |text: &str| MemoField::Hex(text.to_string()).into_bytes();
        Ok(Self {
            memo_type: decode(&json.memo.memo_type)?,
            memo_format: decode(&json.memo.memo_format)?,
            memo_data: decode(&json.memo.memo_data)?,
        })
    }
}

/// Ledger JSON form of a memo: every field upper-case hex
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoJson {
    #[serde(rename = "Memo")]
    pub memo: MemoFieldsJson,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoFieldsJson {
    #[serde(rename = "MemoType", default)]
    pub memo_type: String,
    #[serde(rename = "MemoFormat", default)]
    pub memo_format: String,
    #[serde(rename = "MemoData", default)]
    pub memo_data: String,
}

/// Build a `Memos` array value
pub fn memos_value(memos: &[Memo]) -> Result<Value> {
    let elements = memos
        .iter()
        .map(|memo| -> Result<(FieldId, Value)> {
            Ok((sf::MEMO, Value::Object(memo.to_object()?)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(elements))
}

/// Read the memos out of a decoded transaction
pub fn memos_from_transaction(transaction: &StObject) -> Result<Vec<Memo>> {
    if !transaction.contains(sf::MEMOS) {
        return Ok(Vec::new());
    }
    transaction
        .array(sf::MEMOS)?
        .iter()
        .filter(|(field, _)| *field == sf::MEMO)
        .map(|(_, value)| match value {
            Value::Object(object) => Memo::from_object(object),
            other => Err(ProtocolError::InvalidMemo(format!(
                "Memo element of type {}",
                other.type_code().name()
            ))),
        })
        .collect()
}

/// The three memos carrying one signed envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoTriple {
    pub payload: Memo,
    pub signature: Memo,
    pub public_key: Memo,
}

impl MemoTriple {
    /// Pack an envelope under the given memo type family
    pub fn encode(envelope: &SignedEnvelope, family: &str) -> Self {
        let slot = |kind: &str, format: &str, data: &[u8]| Memo {
            memo_type: format!("{}/{}", family, kind).into_bytes(),
            memo_format: format.as_bytes().to_vec(),
            memo_data: data.to_vec(),
        };
        Self {
            payload: slot("payment", PAYLOAD_FORMAT, &envelope.payload),
            signature: slot("signature", SIGNATURE_FORMAT, &envelope.signature),
            public_key: slot("publickey", PUBLIC_KEY_FORMAT, &envelope.public_key),
        }
    }

    /// Pack fields given as raw bytes or hex text
    pub fn from_fields(
        payload: MemoField,
        signature: MemoField,
        public_key: MemoField,
        family: &str,
    ) -> Result<Self> {
        let envelope = SignedEnvelope {
            payload: payload.into_bytes()?,
            signature: signature.into_bytes()?,
            public_key: public_key.into_bytes()?,
        };
        Ok(Self::encode(&envelope, family))
    }

    /// Memos in slot order
    pub fn into_memos(self) -> Vec<Memo> {
        vec![self.payload, self.signature, self.public_key]
    }

    /// Find the three slots by format label in any order.
    ///
    /// Unrelated memos are ignored; a missing or repeated slot is an error.
    pub fn decode(memos: &[Memo]) -> Result<SignedEnvelope> {
        let find = |label: &'static str| -> Result<Vec<u8>> {
            let mut found = memos.iter().filter(|memo| memo.has_format(label));
            let memo = found.next().ok_or(ProtocolError::MissingMemo(label))?;
            if found.next().is_some() {
                return Err(ProtocolError::DuplicateMemo(label));
            }
            Ok(memo.memo_data.clone())
        };
        Ok(SignedEnvelope {
            payload: find(PAYLOAD_FORMAT)?,
            signature: find(SIGNATURE_FORMAT)?,
            public_key: find(PUBLIC_KEY_FORMAT)?,
        })
    }
}

/// Single memo carrying an unsigned proposal
pub fn proposal_memo(payload: &[u8]) -> Memo {
    Memo {
        memo_type: PROPOSAL_TYPE.as_bytes().to_vec(),
        memo_format: UNSIGNED_PAYLOAD_FORMAT.as_bytes().to_vec(),
        memo_data: payload.to_vec(),
    }
}

/// Payload of the unsigned memo, if exactly one is present
pub fn decode_unsigned(memos: &[Memo]) -> Result<Vec<u8>> {
    let mut found = memos.iter().filter(|memo| memo.has_format(UNSIGNED_PAYLOAD_FORMAT));
    let memo = found.next().ok_or(ProtocolError::MissingMemo(UNSIGNED_PAYLOAD_FORMAT))?;
    if found.next().is_some() {
        return Err(ProtocolError::DuplicateMemo(UNSIGNED_PAYLOAD_FORMAT));
    }
    Ok(memo.memo_data.clone())
}
