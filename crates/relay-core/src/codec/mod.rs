//! Canonical binary object codec
//!
//! Objects are written as `(field header, value)` pairs in `(type code, field
//! code)` order. Because the order is fixed by the field identifiers and not by
//! the caller, equal objects always encode to identical bytes, and decoding
//! rejects anything that is not in that canonical form. Signatures are computed
//! over these bytes.
//!
//! | Type | Code | Encoding |
//! |------|------|----------|
//! | UInt16/32/64 | 1/2/3 | big-endian |
//! | Hash256 | 5 | 32 raw bytes |
//! | Amount | 6 | 8 bytes, native drops with bit 62 set |
//! | Blob | 7 | length prefix + bytes |
//! | AccountID | 8 | length prefix + 20 bytes |
//! | STObject | 14 | fields + `0xE1` |
//! | STArray | 15 | wrapper elements + `0xF1` |

pub mod field;
pub mod value;

mod reader;
mod writer;

pub use field::{sf, FieldId, TypeCode};
pub use value::{StObject, Value};

/// Largest length a variable-length prefix can express
pub const MAX_VL_LENGTH: usize = 918_744;

/// Deepest object/array nesting `deserialize` accepts
pub const MAX_NESTING_DEPTH: usize = 10;

/// Serialize an object to canonical bytes
pub fn serialize(object: &StObject) -> Vec<u8> {
    object.to_bytes()
}

/// Decode canonical bytes into an object
pub fn deserialize(bytes: &[u8]) -> crate::Result<StObject> {
    StObject::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Drops, Hash256};
    use proptest::prelude::*;

    fn memo(kind: &[u8], format: &[u8], data: &[u8]) -> StObject {
        StObject::new()
            .with(sf::MEMO_TYPE, kind)
            .unwrap()
            .with(sf::MEMO_FORMAT, format)
            .unwrap()
            .with(sf::MEMO_DATA, data)
            .unwrap()
    }

    #[test]
    fn test_list_instruction_bytes() {
        let account = AccountId::new([0x11; 20]);
        let obj = StObject::new()
            .with(sf::SEQUENCE, 1_700_000_000u32)
            .unwrap()
            .with(sf::FLAGS, 1u32)
            .unwrap()
            .with(sf::TEMPLATE, Value::Array(vec![(sf::ACCOUNT, Value::Account(account))]))
            .unwrap();

        let bytes = serialize(&obj);
        let mut expected = vec![0x22, 0, 0, 0, 1, 0x24, 0x65, 0x53, 0xF1, 0x00, 0xF5, 0x81, 0x14];
        expected.extend_from_slice(&[0x11; 20]);
        expected.push(0xF1);
        assert_eq!(bytes, expected);
        assert_eq!(deserialize(&bytes).unwrap(), obj);
    }

    #[test]
    fn test_native_amount_encoding() {
        let obj = StObject::new().with(sf::AMOUNT, Drops(1_000_000)).unwrap();
        assert_eq!(
            serialize(&obj),
            vec![0x61, 0x40, 0x00, 0x00, 0x00, 0x00, 0x0F, 0x42, 0x40]
        );
    }

    #[test]
    fn test_nested_memos_roundtrip() {
        let memos = Value::Array(vec![
            (sf::MEMO, Value::Object(memo(b"t1", b"f1", &[1, 2, 3]))),
            (sf::MEMO, Value::Object(memo(b"t2", b"f2", &[0u8; 300]))),
        ]);
        let obj = StObject::new()
            .with(sf::MEMOS, memos)
            .unwrap()
            .with(sf::INVOICE_ID, Hash256::new([9; 32]))
            .unwrap();

        let decoded = deserialize(&serialize(&obj)).unwrap();
        assert_eq!(decoded, obj);
        assert_eq!(decoded.array(sf::MEMOS).unwrap().len(), 2);
    }

    #[test]
    fn test_signing_bytes_skip_signature() {
        let obj = StObject::new()
            .with(sf::SEQUENCE, 3u32)
            .unwrap()
            .with(sf::TXN_SIGNATURE, vec![0xAA; 64])
            .unwrap();
        let signing = obj.to_signing_bytes();
        assert_eq!(signing, vec![0x24, 0, 0, 0, 3]);
        assert!(obj.to_bytes().len() > signing.len());
    }

    fn arb_object() -> impl Strategy<Value = StObject> {
        (
            any::<u32>(),
            any::<u32>(),
            proptest::option::of(any::<u32>()),
            0u64..=Drops::MAX,
            proptest::collection::vec(any::<u8>(), 0..400),
            any::<[u8; 20]>(),
            proptest::collection::vec(any::<[u8; 20]>(), 0..4),
        )
            .prop_map(|(seq, flags, dtag, drops, blob, dest, listed)| {
                let mut obj = StObject::new();
                obj.set(sf::SEQUENCE, seq).unwrap();
                obj.set(sf::FLAGS, flags).unwrap();
                if let Some(tag) = dtag {
                    obj.set(sf::DESTINATION_TAG, tag).unwrap();
                }
                obj.set(sf::AMOUNT, Drops(drops)).unwrap();
                obj.set(sf::PUBLIC_KEY, blob).unwrap();
                obj.set(sf::DESTINATION, AccountId::new(dest)).unwrap();
                let template = listed
                    .into_iter()
                    .map(|a| (sf::ACCOUNT, Value::Account(AccountId::new(a))))
                    .collect();
                obj.set(sf::TEMPLATE, Value::Array(template)).unwrap();
                obj
            })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(obj in arb_object()) {
            let bytes = serialize(&obj);
            prop_assert_eq!(deserialize(&bytes).unwrap(), obj);
        }

        #[test]
        fn prop_distinct_objects_distinct_bytes(a in arb_object(), b in arb_object()) {
            prop_assume!(a != b);
            prop_assert_ne!(serialize(&a), serialize(&b));
        }
    }
}
