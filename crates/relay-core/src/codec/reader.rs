//! Canonical decoder

use super::field::{sf, FieldId, TypeCode};
use super::value::{StObject, Value};
use super::{MAX_NESTING_DEPTH, MAX_VL_LENGTH};
use crate::error::{CodecError, Result};
use crate::types::{AccountId, Drops, Hash256};

const NATIVE_NEGATIVE_OR_ISSUED: u64 = 0x8000_0000_0000_0000;
const NATIVE_POSITIVE: u64 = 0x4000_0000_0000_0000;

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn field_header(&mut self) -> Result<FieldId> {
        let start = self.pos;
        let first = self.byte()?;
        let mut type_code = u16::from(first >> 4);
        let mut nth = u16::from(first & 0x0F);
        if type_code == 0 {
            type_code = u16::from(self.byte()?);
            if type_code < 16 {
                return Err(CodecError::InvalidFieldHeader(start));
            }
        }
        if nth == 0 {
            nth = u16::from(self.byte()?);
            if nth < 16 {
                return Err(CodecError::InvalidFieldHeader(start));
            }
        }
        Ok(FieldId::new(TypeCode::from_u16(type_code)?, nth))
    }

    fn vl_length(&mut self) -> Result<usize> {
        let b1 = usize::from(self.byte()?);
        let len = if b1 <= 192 {
            b1
        } else if b1 <= 240 {
            let b2 = usize::from(self.byte()?);
            193 + (b1 - 193) * 256 + b2
        } else if b1 <= 254 {
            let b2 = usize::from(self.byte()?);
            let b3 = usize::from(self.byte()?);
            12_481 + (b1 - 241) * 65_536 + b2 * 256 + b3
        } else {
            return Err(CodecError::InvalidLength(format!("prefix byte {}", b1)));
        };
        if len > MAX_VL_LENGTH {
            return Err(CodecError::InvalidLength(format!("{} exceeds {}", len, MAX_VL_LENGTH)));
        }
        Ok(len)
    }
}

fn read_value(cursor: &mut Cursor<'_>, field: FieldId, depth: usize) -> Result<Value> {
    Ok(match field.type_code() {
        TypeCode::UInt16 => Value::UInt16(u16::from_be_bytes(cursor.array()?)),
        TypeCode::UInt32 => Value::UInt32(u32::from_be_bytes(cursor.array()?)),
        TypeCode::UInt64 => Value::UInt64(u64::from_be_bytes(cursor.array()?)),
        TypeCode::Hash256 => Value::Hash256(Hash256::new(cursor.array()?)),
        TypeCode::Amount => {
            let raw = u64::from_be_bytes(cursor.array()?);
            if raw & NATIVE_NEGATIVE_OR_ISSUED != 0 {
                return Err(CodecError::UnsupportedAmount("issued currency amount".to_string()));
            }
            if raw & NATIVE_POSITIVE == 0 {
                return Err(CodecError::UnsupportedAmount("negative native amount".to_string()));
            }
            let drops = raw & !NATIVE_POSITIVE;
            if drops > Drops::MAX {
                return Err(CodecError::UnsupportedAmount(format!("{} drops exceeds maximum", drops)));
            }
            Value::Amount(Drops(drops))
        }
        TypeCode::Blob => {
            let len = cursor.vl_length()?;
            Value::Blob(cursor.take(len)?.to_vec())
        }
        TypeCode::AccountId => {
            let len = cursor.vl_length()?;
            if len != AccountId::LEN {
                return Err(CodecError::InvalidAccount(format!("encoded length {}", len)));
            }
            Value::Account(AccountId::from_slice(cursor.take(len)?)?)
        }
        TypeCode::Object => Value::Object(read_fields(cursor, enter(cursor, depth)?)?),
        TypeCode::Array => {
            let depth = enter(cursor, depth)?;
            let mut elements = Vec::new();
            loop {
                let element_field = cursor.field_header()?;
                if element_field == sf::ARRAY_END_MARKER {
                    break;
                }
                if element_field == sf::OBJECT_END_MARKER {
                    return Err(CodecError::InvalidFieldHeader(cursor.pos - 1));
                }
                let value = read_value(cursor, element_field, depth)?;
                elements.push((element_field, value));
            }
            Value::Array(elements)
        }
    })
}

fn enter(cursor: &Cursor<'_>, depth: usize) -> Result<usize> {
    let depth = depth + 1;
    if depth > MAX_NESTING_DEPTH {
        return Err(CodecError::TooDeep {
            offset: cursor.pos,
            limit: MAX_NESTING_DEPTH,
        });
    }
    Ok(depth)
}

/// Fields up to the end of input (`depth` 0) or an object end marker
fn read_fields(cursor: &mut Cursor<'_>, depth: usize) -> Result<StObject> {
    let nested = depth > 0;
    let mut object = StObject::new();
    let mut previous: Option<FieldId> = None;

    loop {
        if !nested && cursor.is_empty() {
            break;
        }
        let header_at = cursor.pos;
        let field = cursor.field_header()?;
        if field == sf::OBJECT_END_MARKER {
            if nested {
                break;
            }
            return Err(CodecError::InvalidFieldHeader(header_at));
        }
        if field == sf::ARRAY_END_MARKER {
            return Err(CodecError::InvalidFieldHeader(header_at));
        }
        if let Some(prev) = previous {
            if field <= prev {
                return Err(CodecError::NonCanonicalOrder {
                    previous: prev.to_string(),
                    field: field.to_string(),
                });
            }
        }
        let value = read_value(cursor, field, depth)?;
        object.insert_decoded(field, value);
        previous = Some(field);
    }

    Ok(object)
}

pub(super) fn read_top_level(bytes: &[u8]) -> Result<StObject> {
    let mut cursor = Cursor::new(bytes);
    read_fields(&mut cursor, 0)
}
