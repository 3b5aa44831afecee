//! Account list module
//!
//! Keeps a set of accounts maintained by one admin key. Updates arrive as
//! signed `ListUpdate` records and must carry increasing sequences.

use relay_core::instruction::{Instruction, ListOperation, ListUpdate};
use relay_core::AccountId;
use relay_crypto::PublicKey;
use relay_protocol::{MemoTriple, Slot, StateSnapshot};

use super::{ExecutionContext, Module, ModuleState, Verdict};

/// Accounts applied from a single update; the rest are ignored
pub const MAX_LIST_ENTRIES: usize = 50;

/// Admin-maintained account list
#[derive(Debug, Clone)]
pub struct ListModule {
    admin: PublicKey,
}

impl ListModule {
    pub fn new(admin: PublicKey) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &PublicKey {
        &self.admin
    }

    /// Whether `account` is on the list held in `snapshot`
    pub fn is_listed(snapshot: &StateSnapshot, module: &AccountId, account: &AccountId) -> bool {
        snapshot.get(&Slot::Listed(*account).keylet(module)).is_some()
    }
}

impl Module for ListModule {
    fn name(&self) -> &str {
        "list"
    }

    fn execute(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict {
        let payment = context.payment;
        if payment.account == context.module {
            return Verdict::accept(0, "Blacklist: Passing outgoing transaction");
        }
        if payment.memos.is_empty() {
            return Verdict::accept(0, "Blacklist: Passing non-memo incoming transaction.");
        }

        let envelope = match MemoTriple::decode(&payment.memos) {
            Ok(envelope) => envelope,
            Err(_) => return Verdict::rollback(50, "Blacklist: Memo transaction did not contain XLS14 format."),
        };
        if envelope.public_key.len() != 33 {
            return Verdict::rollback(55, "Blacklist: Memo public key wrong length.");
        }
        if envelope.public_key != self.admin.to_prefixed() {
            return Verdict::rollback(57, "Blacklist: Invalid admin public key.");
        }
        if envelope.verify().is_err() {
            return Verdict::rollback(60, "Blacklist: Invalid signature in memo.");
        }
        let update = match ListUpdate::from_bytes(&envelope.payload) {
            Ok(update) => update,
            Err(_) => {
                return Verdict::rollback(
                    70,
                    "Blacklist: Validly signed memo lacked required STObject fields.",
                )
            }
        };

        if let Some(previous) = state.get_u32(&Slot::ListSequence) {
            if update.sequence <= previous {
                return Verdict::rollback(75, "Blacklist: Sequence number was less than previous sequence.");
            }
        }
        state.set(&Slot::ListSequence, update.sequence.to_be_bytes().to_vec());

        let mut processed = 0usize;
        for account in update.accounts.iter().take(MAX_LIST_ENTRIES) {
            let slot = Slot::Listed(*account);
            match update.operation {
                ListOperation::Add => state.set(&slot, vec![1]),
                ListOperation::Remove => {
                    state.remove(&slot);
                }
            }
            processed += 1;
        }

        let sign = match update.operation {
            ListOperation::Add => '+',
            ListOperation::Remove => '-',
        };
        Verdict::accept(0, format!("Blacklist: Processed {} {}", sign, processed))
    }
}
