//! # Relay Client
//!
//! Submits signed instructions to a module account and waits for the
//! module's verdict.
//!
//! - `ledger` - the ledger operations the relay depends on
//! - `rpc` - those operations over JSON-RPC
//! - `relay` - carrier payments built around signed envelopes
//! - `confirm` - polling for the module's execution result
//! - `config` - file and environment configuration
//! - `mock` - in-memory ledger running module behaviours
//!
//! ```text
//!   SignedEnvelope ──► RelayClient ──submit──► LedgerClient
//!                          │                        │
//!                          ▼                        ▼
//!                  SubmissionReceipt ──► ConfirmationPoller ──► Confirmation
//! ```

pub mod config;
pub mod confirm;
pub mod error;
pub mod ledger;
pub mod mock;
pub mod relay;
pub mod rpc;

pub use config::RelayConfig;
pub use confirm::*;
pub use error::*;
pub use ledger::*;
pub use relay::*;
pub use rpc::JsonRpcLedger;

/// Relay prelude
pub mod prelude {
    pub use crate::config::RelayConfig;
    pub use crate::confirm::{Confirmation, ConfirmationPoller, ExecutionClass, ExecutionOutcome, PollSettings};
    pub use crate::error::{RelayError, Result};
    pub use crate::ledger::{LedgerClient, SubmitResult, TransactionRecord};
    pub use crate::mock::MockLedger;
    pub use crate::relay::{RelayClient, RelayOptions, SubmissionReceipt};
    pub use crate::rpc::JsonRpcLedger;
}
