//! Field identifiers and the known-field registry

use std::fmt;

use crate::error::{CodecError, Result};

/// Serialized type codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TypeCode {
    UInt16 = 1,
    UInt32 = 2,
    UInt64 = 3,
    Hash256 = 5,
    Amount = 6,
    Blob = 7,
    AccountId = 8,
    Object = 14,
    Array = 15,
}

impl TypeCode {
    pub fn from_u16(code: u16) -> Result<Self> {
        Ok(match code {
            1 => Self::UInt16,
            2 => Self::UInt32,
            3 => Self::UInt64,
            5 => Self::Hash256,
            6 => Self::Amount,
            7 => Self::Blob,
            8 => Self::AccountId,
            14 => Self::Object,
            15 => Self::Array,
            other => return Err(CodecError::UnknownType(other)),
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Hash256 => "Hash256",
            Self::Amount => "Amount",
            Self::Blob => "Blob",
            Self::AccountId => "AccountID",
            Self::Object => "STObject",
            Self::Array => "STArray",
        }
    }
}

/// Field identifier: `(type code, field code)`.
///
/// The derived ordering is the canonical field order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    type_code: TypeCode,
    nth: u16,
}

impl FieldId {
    pub const fn new(type_code: TypeCode, nth: u16) -> Self {
        Self { type_code, nth }
    }

    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub fn nth(&self) -> u16 {
        self.nth
    }

    /// Whether the field is covered by signatures
    pub fn is_signing(&self) -> bool {
        *self != sf::TXN_SIGNATURE
    }

    /// Registered name, if the field is known
    pub fn name(&self) -> Option<&'static str> {
        REGISTRY
            .iter()
            .find(|(field, _)| field == self)
            .map(|(_, name)| *name)
    }

    /// Look a field up by its registered name
    pub fn by_name(name: &str) -> Option<FieldId> {
        REGISTRY
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(field, _)| *field)
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}({})", self.type_code.name(), self.nth),
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Known fields
pub mod sf {
    use super::{FieldId, TypeCode};

    pub const TRANSACTION_TYPE: FieldId = FieldId::new(TypeCode::UInt16, 2);

    pub const FLAGS: FieldId = FieldId::new(TypeCode::UInt32, 2);
    pub const SOURCE_TAG: FieldId = FieldId::new(TypeCode::UInt32, 3);
    pub const SEQUENCE: FieldId = FieldId::new(TypeCode::UInt32, 4);
    pub const DESTINATION_TAG: FieldId = FieldId::new(TypeCode::UInt32, 14);
    pub const LAST_LEDGER_SEQUENCE: FieldId = FieldId::new(TypeCode::UInt32, 27);

    pub const INVOICE_ID: FieldId = FieldId::new(TypeCode::Hash256, 17);

    pub const AMOUNT: FieldId = FieldId::new(TypeCode::Amount, 1);
    pub const FEE: FieldId = FieldId::new(TypeCode::Amount, 8);

    pub const PUBLIC_KEY: FieldId = FieldId::new(TypeCode::Blob, 1);
    pub const SIGNING_PUB_KEY: FieldId = FieldId::new(TypeCode::Blob, 3);
    pub const TXN_SIGNATURE: FieldId = FieldId::new(TypeCode::Blob, 4);
    pub const MEMO_TYPE: FieldId = FieldId::new(TypeCode::Blob, 12);
    pub const MEMO_DATA: FieldId = FieldId::new(TypeCode::Blob, 13);
    pub const MEMO_FORMAT: FieldId = FieldId::new(TypeCode::Blob, 14);

    pub const ACCOUNT: FieldId = FieldId::new(TypeCode::AccountId, 1);
    pub const DESTINATION: FieldId = FieldId::new(TypeCode::AccountId, 3);

    pub const OBJECT_END_MARKER: FieldId = FieldId::new(TypeCode::Object, 1);
    pub const MEMO: FieldId = FieldId::new(TypeCode::Object, 10);

    pub const ARRAY_END_MARKER: FieldId = FieldId::new(TypeCode::Array, 1);
    pub const TEMPLATE: FieldId = FieldId::new(TypeCode::Array, 5);
    pub const MEMOS: FieldId = FieldId::new(TypeCode::Array, 9);
}

const REGISTRY: &[(FieldId, &str)] = &[
    (sf::TRANSACTION_TYPE, "TransactionType"),
    (sf::FLAGS, "Flags"),
    (sf::SOURCE_TAG, "SourceTag"),
    (sf::SEQUENCE, "Sequence"),
    (sf::DESTINATION_TAG, "DestinationTag"),
    (sf::LAST_LEDGER_SEQUENCE, "LastLedgerSequence"),
    (sf::INVOICE_ID, "InvoiceID"),
    (sf::AMOUNT, "Amount"),
    (sf::FEE, "Fee"),
    (sf::PUBLIC_KEY, "PublicKey"),
    (sf::SIGNING_PUB_KEY, "SigningPubKey"),
    (sf::TXN_SIGNATURE, "TxnSignature"),
    (sf::MEMO_TYPE, "MemoType"),
    (sf::MEMO_DATA, "MemoData"),
    (sf::MEMO_FORMAT, "MemoFormat"),
    (sf::ACCOUNT, "Account"),
    (sf::DESTINATION, "Destination"),
    (sf::OBJECT_END_MARKER, "ObjectEndMarker"),
    (sf::MEMO, "Memo"),
    (sf::ARRAY_END_MARKER, "ArrayEndMarker"),
    (sf::TEMPLATE, "Template"),
    (sf::MEMOS, "Memos"),
];
