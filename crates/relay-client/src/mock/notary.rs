//! Notary module
//!
//! Collects endorsements for proposed transactions. A signer proposes by
//! sending the unsigned transaction in a memo and endorses by quoting its
//! proposal id as the InvoiceID. Once the endorsing weight reaches the quorum
//! the proposal is released and its state erased.
//!
//! State per proposal id: the transaction under the id with its last nibble
//! set to `F`, and each signer's weight under the id with its last nibble set
//! to the signer's position (1..=8).

use relay_core::codec::{sf, StObject};
use relay_core::{AccountId, Hash256};
use relay_crypto::sha512_half;
use relay_protocol::{decode_unsigned, StateSnapshot, MINIMUM_PROPOSAL_LIFETIME};

use super::{ExecutionContext, Module, ModuleState, Verdict};

/// Largest proposed transaction accepted
pub const MAX_PROPOSAL_SIZE: usize = 4096;

const MAX_SIGNERS: usize = 8;
const BLOB_NIBBLE: u8 = 0x0F;

fn nibble_key(id: &Hash256, nibble: u8) -> [u8; 32] {
    let mut key = *id.as_bytes();
    key[31] = (key[31] & 0xF0) | (nibble & 0x0F);
    key
}

fn last_ledger(blob: &[u8]) -> Option<u32> {
    StObject::from_bytes(blob)
        .ok()?
        .opt_u32(sf::LAST_LEDGER_SEQUENCE)
        .ok()
        .flatten()
}

/// Weighted multi-party endorsement module
#[derive(Debug, Clone)]
pub struct NotaryModule {
    signers: Vec<(AccountId, u16)>,
    quorum: u32,
}

impl NotaryModule {
    /// Signers beyond the eighth are ignored
    pub fn new(mut signers: Vec<(AccountId, u16)>, quorum: u32) -> Self {
        signers.truncate(MAX_SIGNERS);
        Self { signers, quorum }
    }

    /// Endorsing weight recorded for `id` in `snapshot`
    pub fn pending_weight(snapshot: &StateSnapshot, module: &AccountId, id: &Hash256) -> u32 {
        (1..=MAX_SIGNERS as u8)
            .filter_map(|i| snapshot.get(&relay_protocol::keylet(module, &nibble_key(id, i))))
            .filter_map(|value| <[u8; 2]>::try_from(value).ok())
            .map(|bytes| u32::from(u16::from_be_bytes(bytes)))
            .sum()
    }

    fn erase(state: &mut ModuleState<'_>, id: &Hash256) {
        state.remove_raw(&nibble_key(id, BLOB_NIBBLE));
        for i in 1..=MAX_SIGNERS as u8 {
            state.remove_raw(&nibble_key(id, i));
        }
    }

    fn weight_total(state: &ModuleState<'_>, id: &Hash256) -> u32 {
        (1..=MAX_SIGNERS as u8)
            .filter_map(|i| state.get_raw(&nibble_key(id, i)))
            .filter_map(|value| <[u8; 2]>::try_from(value).ok())
            .map(|bytes| u32::from(u16::from_be_bytes(bytes)))
            .sum()
    }
}

impl Module for NotaryModule {
    fn name(&self) -> &str {
        "notary"
    }

    fn execute(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict {
        let payment = context.payment;
        if payment.account == context.module {
            return Verdict::accept(20, "Notary: Outgoing transaction");
        }

        let has_memo = !payment.memos.is_empty();
        if let (Some(invoice), false) = (payment.invoice_id, has_memo) {
            let blob = match state.get_raw(&nibble_key(&invoice, BLOB_NIBBLE)) {
                Some(blob) => blob.to_vec(),
                None => {
                    return Verdict::rollback(
                        1,
                        "Notary: Received invoice id that did not correspond to a submitted multisig txn.",
                    )
                }
            };
            if last_ledger(&blob).map_or(true, |last| last < context.ledger_index) {
                Self::erase(state, &invoice);
                return Verdict::accept(
                    1,
                    "Notary: Multisig txn was too old (last ledger seq passed) and was erased.",
                );
            }
        }
        match (payment.invoice_id.is_some(), has_memo) {
            (false, false) => {
                return Verdict::accept(0, "Notary: Incoming txn with neither memo nor invoice ID, passing.")
            }
            (true, true) => {
                return Verdict::rollback(0, "Notary: Incoming txn with both memo and invoice ID, abort.")
            }
            _ => {}
        }

        let (position, weight) = match self
            .signers
            .iter()
            .position(|(account, _)| *account == payment.account)
        {
            Some(index) => (index as u8 + 1, self.signers[index].1),
            None => return Verdict::rollback(70, "Notary: Your account was not present in the signer list."),
        };

        let id = match payment.invoice_id {
            Some(invoice) => invoice,
            None => {
                let blob = match decode_unsigned(&payment.memos) {
                    Ok(blob) => blob,
                    Err(_) => return Verdict::accept(50, "Notary: Memo is an invalid format. Passing txn."),
                };
                if blob.len() > MAX_PROPOSAL_SIZE {
                    return Verdict::rollback(4, "Notary: Memo too large (4kib max).");
                }
                if StObject::from_bytes(&blob).map_or(true, |tx| tx.is_empty()) {
                    return Verdict::rollback(
                        2,
                        "Notary: Memo is invalid format. Should be an unsigned transaction.",
                    );
                }
                let expires_ok = last_ledger(&blob).map_or(false, |last| {
                    last >= context.ledger_index.saturating_add(MINIMUM_PROPOSAL_LIFETIME)
                });
                if !expires_ok {
                    return Verdict::rollback(3, "Notary: Provided txn blob expires too soo (LastLedgerSeq).");
                }
                let id = sha512_half(&blob);
                state.set_raw(&nibble_key(&id, BLOB_NIBBLE), blob);
                id
            }
        };

        state.set_raw(&nibble_key(&id, position), weight.to_be_bytes().to_vec());
        let total = Self::weight_total(state, &id);
        if total < self.quorum {
            return Verdict::accept(
                0,
                format!("Notary: Accepted waiting for other signers...: {}", id.to_hex()),
            );
        }

        let blob = match state.get_raw(&nibble_key(&id, BLOB_NIBBLE)) {
            Some(blob) => blob.to_vec(),
            None => return Verdict::rollback(1, "Notary: Tried to emit multisig txn but it was msising"),
        };
        Self::erase(state, &id);
        if last_ledger(&blob).map_or(true, |last| last < context.ledger_index) {
            return Verdict::rollback(1, "Notary: Was about to emit txn but it's too old now");
        }
        Verdict::accept(0, "Notary: Emitted multisigned txn")
    }
}
