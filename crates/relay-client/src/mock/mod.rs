//! In-memory ledger with module behaviours
//!
//! `MockLedger` accepts carrier payments the way a real ledger would check
//! them (canonical decoding, signature, account sequence, validity window),
//! then runs the module installed on the destination account against that
//! account's state. A module that rolls back leaves the state untouched.
//!
//! By default each accepted submission closes one ledger and is validated at
//! once. [`MockLedger::hold_validation`] queues submissions until
//! [`MockLedger::close_ledger`] is called.

mod liteacc;
mod list;
mod notary;

pub use liteacc::{LiteAccountModule, NEW_ACCOUNT_FEE, USAGE_FEE};
pub use list::{ListModule, MAX_LIST_ENTRIES};
pub use notary::{NotaryModule, MAX_PROPOSAL_SIZE};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::codec::StObject;
use relay_core::{AccountId, Hash256};
use relay_protocol::{
    keylet, transaction_id, verify_transaction, CarrierPayment, Slot, StateEntry, StateSnapshot,
};
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::ledger::{
    LedgerClient, ModuleExecution, SubmitResult, TransactionRecord, EXECUTION_ACCEPTED,
    EXECUTION_ROLLED_BACK,
};

/// Outcome of one module execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept { code: u64, message: String },
    Rollback { code: u64, message: String },
}

impl Verdict {
    pub fn accept(code: u64, message: impl Into<String>) -> Self {
        Self::Accept {
            code,
            message: message.into(),
        }
    }

    pub fn rollback(code: u64, message: impl Into<String>) -> Self {
        Self::Rollback {
            code,
            message: message.into(),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

/// Transaction as a module sees it
pub struct ExecutionContext<'a> {
    /// Account the module is installed on
    pub module: AccountId,
    pub payment: &'a CarrierPayment,
    /// Ledger the transaction is applied in
    pub ledger_index: u32,
}

/// Module-private key-value store, addressed by discriminant
pub struct ModuleState<'a> {
    module: AccountId,
    snapshot: &'a mut StateSnapshot,
}

impl<'a> ModuleState<'a> {
    pub fn new(module: AccountId, snapshot: &'a mut StateSnapshot) -> Self {
        Self { module, snapshot }
    }

    pub fn get_raw(&self, discriminant: &[u8; 32]) -> Option<&[u8]> {
        self.snapshot.get(&keylet(&self.module, discriminant))
    }

    pub fn set_raw(&mut self, discriminant: &[u8; 32], value: Vec<u8>) {
        self.snapshot.insert(keylet(&self.module, discriminant), value);
    }

    pub fn remove_raw(&mut self, discriminant: &[u8; 32]) -> Option<Vec<u8>> {
        self.snapshot.remove(&keylet(&self.module, discriminant))
    }

    pub fn get(&self, slot: &Slot) -> Option<&[u8]> {
        self.get_raw(&slot.discriminant())
    }

    pub fn set(&mut self, slot: &Slot, value: Vec<u8>) {
        self.set_raw(&slot.discriminant(), value)
    }

    pub fn remove(&mut self, slot: &Slot) -> Option<Vec<u8>> {
        self.remove_raw(&slot.discriminant())
    }

    /// Big-endian u32 slot, `None` if absent or the wrong width
    pub fn get_u32(&self, slot: &Slot) -> Option<u32> {
        let bytes: [u8; 4] = self.get(slot)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Big-endian u64 slot, `None` if absent or the wrong width
    pub fn get_u64(&self, slot: &Slot) -> Option<u64> {
        let bytes: [u8; 8] = self.get(slot)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

/// Program run by the ledger on every payment to its account
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, context: &ExecutionContext<'_>, state: &mut ModuleState<'_>) -> Verdict;
}

struct StoredTransaction {
    record: TransactionRecord,
    last_ledger: Option<u32>,
}

#[derive(Default)]
struct MockState {
    ledger_index: u32,
    /// Next sequence of each funded account
    accounts: HashMap<AccountId, u32>,
    state: HashMap<AccountId, StateSnapshot>,
    modules: HashMap<AccountId, Arc<dyn Module>>,
    transactions: HashMap<Hash256, StoredTransaction>,
    /// Accepted but not yet applied, in submission order
    pending: Vec<(Hash256, CarrierPayment)>,
    hold_validation: bool,
    auto_advance: bool,
}

/// In-memory [`LedgerClient`] for tests and simulation
pub struct MockLedger {
    inner: Mutex<MockState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MockLedger {
    pub fn new(ledger_index: u32) -> Self {
        Self {
            inner: Mutex::new(MockState {
                ledger_index,
                ..Default::default()
            }),
        }
    }

    /// Create a real account with sequence 1
    pub fn fund(&self, account: AccountId) {
        self.inner.lock().accounts.entry(account).or_insert(1);
    }

    /// Install `module` on `account`, funding it if needed
    pub fn install(&self, account: AccountId, module: Arc<dyn Module>) {
        let mut inner = self.inner.lock();
        inner.accounts.entry(account).or_insert(1);
        debug!(%account, module = module.name(), "module installed");
        inner.modules.insert(account, module);
    }

    /// Copy of an account's module state
    pub fn state_of(&self, account: &AccountId) -> StateSnapshot {
        self.inner.lock().state.get(account).cloned().unwrap_or_default()
    }

    /// Overwrite one state slot of a module account
    pub fn write_slot(&self, account: &AccountId, slot: &Slot, value: Vec<u8>) {
        let mut inner = self.inner.lock();
        let snapshot = inner.state.entry(*account).or_default();
        ModuleState::new(*account, snapshot).set(slot, value);
    }

    /// Queue submissions instead of validating them immediately
    pub fn hold_validation(&self, hold: bool) {
        self.inner.lock().hold_validation = hold;
    }

    /// Advance one ledger on every `current_ledger` query
    pub fn set_auto_advance(&self, enabled: bool) {
        self.inner.lock().auto_advance = enabled;
    }

    pub fn ledger_index(&self) -> u32 {
        self.inner.lock().ledger_index
    }

    pub fn advance_ledgers(&self, count: u32) {
        let mut inner = self.inner.lock();
        inner.ledger_index = inner.ledger_index.saturating_add(count);
    }

    /// Apply every queued submission and close the ledger.
    ///
    /// Submissions whose validity window has passed are dropped.
    pub fn close_ledger(&self) {
        let mut inner = self.inner.lock();
        let pending = std::mem::take(&mut inner.pending);
        for (id, payment) in pending {
            inner.apply(id, &payment);
        }
        inner.ledger_index = inner.ledger_index.saturating_add(1);
    }

    fn check(&self, blob: &[u8]) -> std::result::Result<(Hash256, CarrierPayment), SubmitResult> {
        let reject = |code: &str, message: String| SubmitResult {
            code: code.to_string(),
            message,
        };
        let tx = StObject::from_bytes(blob).map_err(|e| reject("temMALFORMED", e.to_string()))?;
        verify_transaction(&tx).map_err(|e| reject("temBAD_SIGNATURE", e.to_string()))?;
        let payment =
            CarrierPayment::from_object(&tx).map_err(|e| reject("temMALFORMED", e.to_string()))?;
        Ok((transaction_id(blob), payment))
    }
}

impl MockState {
    /// Run the destination module and record the validated transaction
    fn apply(&mut self, id: Hash256, payment: &CarrierPayment) {
        let ledger_index = self.ledger_index;
        let last_ledger = payment.last_ledger_sequence;
        if last_ledger.map_or(false, |last| last < ledger_index) {
            debug!(tx = %id, ledger_index, "dropped expired transaction");
            return;
        }

        let mut executions = Vec::new();
        let mut result = "tesSUCCESS".to_string();
        if let Some(module) = self.modules.get(&payment.destination).cloned() {
            let account = payment.destination;
            let mut working = self.state.get(&account).cloned().unwrap_or_default();
            let context = ExecutionContext {
                module: account,
                payment,
                ledger_index,
            };
            let verdict = module.execute(&context, &mut ModuleState::new(account, &mut working));
            let (code, message, execution_result) = match verdict {
                Verdict::Accept { code, message } => {
                    self.state.insert(account, working);
                    (code, message, EXECUTION_ACCEPTED)
                }
                Verdict::Rollback { code, message } => {
                    result = "tecHOOK_REJECTED".to_string();
                    (code, message, EXECUTION_ROLLED_BACK)
                }
            };
            debug!(tx = %id, module = module.name(), code, %message, "module executed");
            executions.push(ModuleExecution {
                account,
                return_code: code,
                return_string_hex: hex::encode_upper(message.as_bytes()),
                result: Some(execution_result),
            });
        }

        self.transactions.insert(
            id,
            StoredTransaction {
                record: TransactionRecord {
                    id,
                    validated: true,
                    ledger_index: Some(ledger_index),
                    result: Some(result),
                    executions,
                },
                last_ledger,
            },
        );
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit(&self, blob: &[u8]) -> Result<SubmitResult> {
        let (id, payment) = match self.check(blob) {
            Ok(checked) => checked,
            Err(rejection) => return Ok(rejection),
        };

        let mut inner = self.inner.lock();
        let expected = match inner.accounts.get(&payment.account) {
            Some(sequence) => *sequence,
            None => {
                return Ok(SubmitResult {
                    code: "terNO_ACCOUNT".to_string(),
                    message: "The source account does not exist.".to_string(),
                })
            }
        };
        if payment.sequence < expected {
            return Ok(SubmitResult {
                code: "tefPAST_SEQ".to_string(),
                message: "This sequence number has already passed.".to_string(),
            });
        }
        if payment.sequence > expected {
            return Ok(SubmitResult {
                code: "terPRE_SEQ".to_string(),
                message: "Missing/inapplicable prior transaction.".to_string(),
            });
        }
        if let Some(last) = payment.last_ledger_sequence {
            if last < inner.ledger_index {
                return Ok(SubmitResult {
                    code: "tefMAX_LEDGER".to_string(),
                    message: "Ledger sequence too high.".to_string(),
                });
            }
        }

        inner.accounts.insert(payment.account, expected + 1);
        if inner.hold_validation {
            inner.transactions.insert(
                id,
                StoredTransaction {
                    record: TransactionRecord {
                        id,
                        validated: false,
                        ledger_index: None,
                        result: None,
                        executions: Vec::new(),
                    },
                    last_ledger: payment.last_ledger_sequence,
                },
            );
            inner.pending.push((id, payment));
        } else {
            inner.apply(id, &payment);
            inner.ledger_index = inner.ledger_index.saturating_add(1);
        }
        debug!(tx = %id, "mock accepted submission");
        Ok(SubmitResult {
            code: "tesSUCCESS".to_string(),
            message: "The transaction was applied. Only final in a validated ledger.".to_string(),
        })
    }

    async fn fetch_transaction(&self, id: &Hash256) -> Result<Option<TransactionRecord>> {
        let inner = self.inner.lock();
        Ok(inner.transactions.get(id).map(|stored| {
            let mut record = stored.record.clone();
            // A queued transaction past its window will never validate
            if !record.validated && stored.last_ledger.map_or(false, |l| l < inner.ledger_index) {
                record.result = Some("tefMAX_LEDGER".to_string());
            }
            record
        }))
    }

    async fn fetch_account_state(&self, account: &AccountId) -> Result<Vec<StateEntry>> {
        let inner = self.inner.lock();
        Ok(inner
            .state
            .get(account)
            .map(|snapshot| snapshot.entries().collect())
            .unwrap_or_default())
    }

    async fn account_sequence(&self, account: &AccountId) -> Result<u32> {
        self.inner
            .lock()
            .accounts
            .get(account)
            .copied()
            .ok_or_else(|| RelayError::Rpc(format!("account_info: actNotFound: {}", account)))
    }

    async fn current_ledger(&self) -> Result<u32> {
        let mut inner = self.inner.lock();
        if inner.auto_advance {
            inner.ledger_index = inner.ledger_index.saturating_add(1);
        }
        Ok(inner.ledger_index)
    }
}
