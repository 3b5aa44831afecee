//! Lite account module
//!
//! Holds balances for virtual actors identified by tags. A payment without
//! memos creates or credits an actor; a payment carrying a signed memo triple
//! spends from one.

use relay_core::instruction::{Instruction, LitePayment};
use relay_crypto::PublicKey;
use relay_protocol::{MemoTriple, Slot};

use super::{ExecutionContext, Module, ModuleState, Verdict};

/// Drops kept when an actor is created
pub const NEW_ACCOUNT_FEE: u64 = 1_000_000;

/// Drops kept per credit or spend
pub const USAGE_FEE: u64 = 100_000;

/// Balance-holding module for virtual actors
#[derive(Debug, Default)]
pub struct LiteAccountModule;

impl LiteAccountModule {
    pub fn new() -> Self {
        Self
    }

    fn spend(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict {
        let envelope = match MemoTriple::decode(&context.payment.memos) {
            Ok(envelope) => envelope,
            Err(_) => return Verdict::rollback(50, "Liteacc: [3] Memo is an invalid format."),
        };
        if envelope.verify().is_err() {
            return Verdict::rollback(60, "Liteacc: [3] Invalid signature in memo.");
        }
        let record = match LitePayment::from_bytes(&envelope.payload) {
            Ok(record) => record,
            Err(_) => {
                return Verdict::rollback(
                    70,
                    "Liteacc: [3] Validly signed memo lacked required STObject fields.",
                )
            }
        };
        if record.amount.0 == 0 {
            return Verdict::rollback(80, "Liteacc: [3] Invalid amount specified in STObject.");
        }
        if record.public_key != envelope.public_key {
            return Verdict::rollback(95, "Liteacc: [3] Memo was not signed by the key in its STObject.");
        }

        let tag = record.source_tag;
        let on_file = match state.get(&Slot::PublicKey(tag)) {
            Some(key) => key.to_vec(),
            None => {
                return Verdict::rollback(
                    100,
                    "Liteacc: [3] No lite account was associated with the supplied source tag.",
                )
            }
        };
        if on_file.as_slice() != &record.public_key[1..] {
            return Verdict::rollback(
                110,
                "Liteacc: [3] Src tag did not match public key on file for this account.",
            );
        }

        let last = match state.get_u32(&Slot::Sequence(tag)) {
            Some(last) => last,
            None => return Verdict::rollback(120, "Liteacc: [3] Last sequence not found in lookup."),
        };
        if last >= record.sequence {
            return Verdict::rollback(130, "Liteacc: [3] Last sequence is >= provided sequence number.");
        }

        let key = match PublicKey::from_prefixed(&record.public_key) {
            Ok(key) => key,
            Err(_) => {
                return Verdict::rollback(90, "Liteacc: [3] Invalid public key provided in memo STObject.")
            }
        };
        let balance_slot = Slot::Balance(key);
        let balance = match state.get_u64(&balance_slot) {
            Some(balance) => balance,
            None => return Verdict::rollback(140, "Liteacc: [3] Could not retrieve user's balance."),
        };

        let billable = match record.amount.0.checked_add(USAGE_FEE) {
            Some(billable) => billable,
            None => return Verdict::rollback(145, "Liteacc: [3] Invariant tripped."),
        };
        if balance < billable {
            return Verdict::rollback(
                150,
                format!("Liteacc: [3] User balance {} less than required {}", balance, billable),
            );
        }
        let new_balance = balance - billable;

        state.set(&balance_slot, new_balance.to_be_bytes().to_vec());
        state.set(&Slot::Sequence(tag), record.sequence.to_be_bytes().to_vec());
        Verdict::accept(
            0,
            format!(
                "Liteacc: [3] Successfully emitted {}, new balance: {}",
                record.amount.0, new_balance
            ),
        )
    }

    fn credit(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict {
        let payment = context.payment;
        let amount = payment.amount.0;

        let key = if let Some(invoice) = payment.invoice_id {
            if Slot::collides_with_tag_slots(invoice.as_bytes()) {
                return Verdict::rollback(180, "Liteacc: [0] invalid public key supplied in invoice_id");
            }
            match PublicKey::from_raw(invoice.as_bytes()) {
                Ok(key) => key,
                Err(_) => {
                    return Verdict::rollback(180, "Liteacc: [0] invalid public key supplied in invoice_id")
                }
            }
        } else if let Some(tag) = payment.destination_tag.filter(|tag| *tag > 0) {
            match state.get(&Slot::PublicKey(tag)).map(PublicKey::from_raw) {
                Some(Ok(key)) => key,
                _ => {
                    return Verdict::rollback(
                        190,
                        "Liteacc: [2] dest tag suppled with transaction was not connected to a liteacc.",
                    )
                }
            }
        } else {
            return Verdict::rollback(
                200,
                "Liteacc: [1/2] Cannot continue without a lite acc public key, please supply via InvoiceID",
            );
        };

        let balance_slot = Slot::Balance(key);
        match state.get_u64(&balance_slot) {
            Some(balance) => {
                let balance = balance.saturating_add(amount - USAGE_FEE);
                state.set(&balance_slot, balance.to_be_bytes().to_vec());
                Verdict::accept(0, format!("Liteacc: [2] User balance is {}", balance))
            }
            None => {
                if amount < NEW_ACCOUNT_FEE {
                    return Verdict::rollback(
                        210,
                        "Liteacc: [1] Insufficient drops sent to create a new account.",
                    );
                }
                let tag = match state.get_u32(&Slot::Counter).unwrap_or(0).checked_add(1) {
                    Some(tag) => tag,
                    None => {
                        return Verdict::rollback(250, "Liteacc: [1] Could not assign new user a destination tag.")
                    }
                };
                let balance = amount - NEW_ACCOUNT_FEE;
                state.set(&balance_slot, balance.to_be_bytes().to_vec());
                state.set(&Slot::Counter, tag.to_be_bytes().to_vec());
                state.set(&Slot::PublicKey(tag), key.raw().to_vec());
                state.set(&Slot::Sequence(tag), 0u32.to_be_bytes().to_vec());
                Verdict::accept(
                    0,
                    format!("Liteacc: [1] New user's balance is {} and dest tag is {}", balance, tag),
                )
            }
        }
    }
}

impl Module for LiteAccountModule {
    fn name(&self) -> &str {
        "liteacc"
    }

    fn execute(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict {
        let payment = context.payment;
        if payment.account == context.module {
            return Verdict::accept(20, "Liteacc: Outgoing transaction");
        }
        if payment.amount.0 < USAGE_FEE {
            return Verdict::rollback(40, "Liteacc: Insufficient drops sent to do anything!");
        }
        if payment.memos.is_empty() {
            self.credit(context, state)
        } else {
            self.spend(context, state)
        }
    }
}
