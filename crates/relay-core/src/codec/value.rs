//! Field values and canonical objects

use std::collections::BTreeMap;

use super::field::{sf, FieldId, TypeCode};
use super::{reader, writer, MAX_VL_LENGTH};
use crate::error::{CodecError, Result};
use crate::types::{AccountId, Drops, Hash256};

/// A single field value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Hash256(Hash256),
    Amount(Drops),
    Blob(Vec<u8>),
    Account(AccountId),
    Object(StObject),
    /// Array of single-field wrapper elements
    Array(Vec<(FieldId, Value)>),
}

impl Value {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::UInt16(_) => TypeCode::UInt16,
            Self::UInt32(_) => TypeCode::UInt32,
            Self::UInt64(_) => TypeCode::UInt64,
            Self::Hash256(_) => TypeCode::Hash256,
            Self::Amount(_) => TypeCode::Amount,
            Self::Blob(_) => TypeCode::Blob,
            Self::Account(_) => TypeCode::AccountId,
            Self::Object(_) => TypeCode::Object,
            Self::Array(_) => TypeCode::Array,
        }
    }

    /// Check the value can be written under `field`
    fn validate(&self, field: FieldId) -> Result<()> {
        if self.type_code() != field.type_code() {
            return Err(CodecError::WrongType {
                field: field.name().unwrap_or("unknown"),
                found: self.type_code().name(),
            });
        }
        if field == sf::OBJECT_END_MARKER || field == sf::ARRAY_END_MARKER {
            return Err(CodecError::InvalidValue {
                field: field.name().unwrap_or("marker"),
                reason: "end markers cannot carry values".to_string(),
            });
        }
        match self {
            Self::Blob(bytes) if bytes.len() > MAX_VL_LENGTH => Err(CodecError::InvalidLength(format!(
                "blob of {} bytes exceeds {}",
                bytes.len(),
                MAX_VL_LENGTH
            ))),
            Self::Amount(drops) if drops.get() > Drops::MAX => Err(CodecError::UnsupportedAmount(format!(
                "{} exceeds the native maximum",
                drops
            ))),
            Self::Array(elements) => {
                for (element_field, element) in elements {
                    element.validate(*element_field)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UInt16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<Hash256> for Value {
    fn from(v: Hash256) -> Self {
        Self::Hash256(v)
    }
}

impl From<Drops> for Value {
    fn from(v: Drops) -> Self {
        Self::Amount(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<AccountId> for Value {
    fn from(v: AccountId) -> Self {
        Self::Account(v)
    }
}

impl From<StObject> for Value {
    fn from(v: StObject) -> Self {
        Self::Object(v)
    }
}

/// Canonical object.
///
/// Fields are kept in canonical order regardless of insertion order, so two
/// objects with the same field values always serialize to the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StObject {
    fields: BTreeMap<FieldId, Value>,
}

impl StObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, field: FieldId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        value.validate(field)?;
        self.fields.insert(field, value);
        Ok(())
    }

    /// Builder form of [`StObject::set`]
    pub fn with(mut self, field: FieldId, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    pub fn remove(&mut self, field: FieldId) -> Option<Value> {
        self.fields.remove(&field)
    }

    pub fn get(&self, field: FieldId) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Value)> {
        self.fields.iter()
    }

    fn required(&self, field: FieldId) -> Result<&Value> {
        self.get(field)
            .ok_or(CodecError::MissingField(field.name().unwrap_or("unknown")))
    }

    fn wrong(field: FieldId, value: &Value) -> CodecError {
        CodecError::WrongType {
            field: field.name().unwrap_or("unknown"),
            found: value.type_code().name(),
        }
    }

    pub fn u16(&self, field: FieldId) -> Result<u16> {
        match self.required(field)? {
            Value::UInt16(v) => Ok(*v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn u32(&self, field: FieldId) -> Result<u32> {
        match self.required(field)? {
            Value::UInt32(v) => Ok(*v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn hash256(&self, field: FieldId) -> Result<Hash256> {
        match self.required(field)? {
            Value::Hash256(v) => Ok(*v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn amount(&self, field: FieldId) -> Result<Drops> {
        match self.required(field)? {
            Value::Amount(v) => Ok(*v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn blob(&self, field: FieldId) -> Result<&[u8]> {
        match self.required(field)? {
            Value::Blob(v) => Ok(v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn account(&self, field: FieldId) -> Result<AccountId> {
        match self.required(field)? {
            Value::Account(v) => Ok(*v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn object(&self, field: FieldId) -> Result<&StObject> {
        match self.required(field)? {
            Value::Object(v) => Ok(v),
            other => Err(Self::wrong(field, other)),
        }
    }

    pub fn array(&self, field: FieldId) -> Result<&[(FieldId, Value)]> {
        match self.required(field)? {
            Value::Array(v) => Ok(v),
            other => Err(Self::wrong(field, other)),
        }
    }

    /// Optional UInt32 field
    pub fn opt_u32(&self, field: FieldId) -> Result<Option<u32>> {
        if self.contains(field) {
            self.u32(field).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Canonical bytes of every field
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        writer::write_fields(&mut out, self, false);
        out
    }

    /// Canonical bytes of the signing fields only
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        writer::write_fields(&mut out, self, true);
        out
    }

    /// Decode canonical bytes; non-canonical input is rejected
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        reader::read_top_level(bytes)
    }

    pub(super) fn insert_decoded(&mut self, field: FieldId, value: Value) {
        self.fields.insert(field, value);
    }
}
