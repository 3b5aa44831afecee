//! Canonical encoder

use super::field::{sf, FieldId};
use super::value::{StObject, Value};

const NATIVE_POSITIVE: u64 = 0x4000_0000_0000_0000;

pub(super) fn write_field_header(out: &mut Vec<u8>, field: FieldId) {
    let type_code = field.type_code().code();
    let nth = field.nth();
    match (type_code < 16, nth < 16) {
        (true, true) => out.push(((type_code as u8) << 4) | nth as u8),
        (true, false) => {
            out.push((type_code as u8) << 4);
            out.push(nth as u8);
        }
        (false, true) => {
            out.push(nth as u8);
            out.push(type_code as u8);
        }
        (false, false) => {
            out.push(0);
            out.push(type_code as u8);
            out.push(nth as u8);
        }
    }
}

/// Variable-length prefix. Lengths are bounded by `StObject::set`.
pub(super) fn write_vl_length(out: &mut Vec<u8>, len: usize) {
    if len <= 192 {
        out.push(len as u8);
    } else if len <= 12_480 {
        let l = len - 193;
        out.push(193 + (l >> 8) as u8);
        out.push((l & 0xFF) as u8);
    } else {
        let l = len - 12_481;
        out.push(241 + (l >> 16) as u8);
        out.push(((l >> 8) & 0xFF) as u8);
        out.push((l & 0xFF) as u8);
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value, signing_only: bool) {
    match value {
        Value::UInt16(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::UInt32(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::UInt64(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Hash256(v) => out.extend_from_slice(v.as_bytes()),
        Value::Amount(drops) => out.extend_from_slice(&(drops.get() | NATIVE_POSITIVE).to_be_bytes()),
        Value::Blob(bytes) => {
            write_vl_length(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        Value::Account(account) => {
            write_vl_length(out, 20);
            out.extend_from_slice(account.as_bytes());
        }
        Value::Object(inner) => {
            write_fields(out, inner, signing_only);
            write_field_header(out, sf::OBJECT_END_MARKER);
        }
        Value::Array(elements) => {
            for (field, element) in elements {
                if signing_only && !field.is_signing() {
                    continue;
                }
                write_field_header(out, *field);
                write_value(out, element, signing_only);
            }
            write_field_header(out, sf::ARRAY_END_MARKER);
        }
    }
}

pub(super) fn write_fields(out: &mut Vec<u8>, object: &StObject, signing_only: bool) {
    for (field, value) in object.iter() {
        if signing_only && !field.is_signing() {
            continue;
        }
        write_field_header(out, *field);
        write_value(out, value, signing_only);
    }
}
