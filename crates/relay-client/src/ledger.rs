//! Ledger interface consumed by the relay

use async_trait::async_trait;
use relay_core::{AccountId, Hash256};
use relay_protocol::StateEntry;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `HookResult` value of an execution that accepted
pub const EXECUTION_ACCEPTED: u8 = 3;

/// `HookResult` value of an execution that rolled back
pub const EXECUTION_ROLLED_BACK: u8 = 2;

/// Answer to a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    /// Engine result code, e.g. `tesSUCCESS`
    pub code: String,
    pub message: String,
}

impl SubmitResult {
    /// Whether the network took the transaction for processing
    pub fn is_accepted(&self) -> bool {
        self.code.starts_with("tes") || self.code == "terQUEUED"
    }
}

/// One module execution reported in transaction metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleExecution {
    /// Account the module ran on
    pub account: AccountId,
    pub return_code: u64,
    /// Hex as reported by the ledger
    pub return_string_hex: String,
    /// `HookResult`, when the ledger reports it
    pub result: Option<u8>,
}

/// Transaction as fetched from the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Hash256,
    pub validated: bool,
    pub ledger_index: Option<u32>,
    /// `TransactionResult` from the metadata
    pub result: Option<String>,
    pub executions: Vec<ModuleExecution>,
}

/// Ledger operations the relay needs
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a signed transaction blob
    async fn submit(&self, blob: &[u8]) -> Result<SubmitResult>;

    /// Fetch a transaction with metadata; `None` if the ledger does not know it
    async fn fetch_transaction(&self, id: &Hash256) -> Result<Option<TransactionRecord>>;

    /// Every module state entry owned by `account`
    async fn fetch_account_state(&self, account: &AccountId) -> Result<Vec<StateEntry>>;

    /// Next sequence of a real account
    async fn account_sequence(&self, account: &AccountId) -> Result<u32>;

    /// Index of the ledger currently being built
    async fn current_ledger(&self) -> Result<u32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_codes() {
        let result = |code: &str| SubmitResult {
            code: code.to_string(),
            message: String::new(),
        };
        assert!(result("tesSUCCESS").is_accepted());
        assert!(result("terQUEUED").is_accepted());
        assert!(!result("terPRE_SEQ").is_accepted());
        assert!(!result("tefPAST_SEQ").is_accepted());
        assert!(!result("temMALFORMED").is_accepted());
    }
}
