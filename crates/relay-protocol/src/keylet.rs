//! State keylets
//!
//! A module addresses each slot of its private store by a 32-byte
//! discriminant. The ledger stores the slot under
//! `SHA-512(00 76 ‖ module account ‖ discriminant)[..32]`.

use relay_core::{AccountId, Hash256, Tag};
use relay_crypto::{sha512_half_concat, PublicKey};

/// Namespace prefix of module state entries
pub const KEYLET_NAMESPACE: [u8; 2] = [0x00, 0x76];

const FRONT_ONES: [u8; 4] = [0xFF; 4];

/// Ledger key of one state slot
pub fn keylet(account: &AccountId, discriminant: &[u8]) -> Hash256 {
    sha512_half_concat(&[&KEYLET_NAMESPACE, account.as_bytes(), discriminant])
}

/// Known state slots of the lite account and list modules
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Last allocated tag
    Counter,
    /// Last accepted sequence of a tag
    Sequence(Tag),
    /// Public key owning a tag
    PublicKey(Tag),
    /// Balance held for a key
    Balance(PublicKey),
    /// Last accepted sequence of a list module
    ListSequence,
    /// Membership of an account in a list module
    Listed(AccountId),
}

impl Slot {
    /// 32-byte discriminant.
    ///
    /// `Sequence(0)` coincides with `Counter`; tags start at 1.
    pub fn discriminant(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        match self {
            Self::Counter => out[..4].copy_from_slice(&FRONT_ONES),
            Self::Sequence(tag) => {
                out[..4].copy_from_slice(&FRONT_ONES);
                out[28..].copy_from_slice(&tag.to_be_bytes());
            }
            Self::PublicKey(tag) => out[28..].copy_from_slice(&tag.to_be_bytes()),
            Self::Balance(key) => out.copy_from_slice(key.raw()),
            Self::ListSequence => {}
            Self::Listed(account) => out[12..].copy_from_slice(account.as_bytes()),
        }
        out
    }

    pub fn keylet(&self, module: &AccountId) -> Hash256 {
        keylet(module, &self.discriminant())
    }

    /// Whether a 32-byte value could be mistaken for a counter or tag slot.
    ///
    /// Modules refuse such values as balance keys.
    pub fn collides_with_tag_slots(candidate: &[u8; 32]) -> bool {
        let zero_tail = candidate[4..28].iter().all(|b| *b == 0);
        let front = &candidate[..4];
        zero_tail && (front == FRONT_ONES || front == [0u8; 4])
    }
}
