//! # Relay Protocol
//!
//! How a signed instruction travels to a module and how the module's state is
//! read back:
//! - `envelope` - payload, signature and key as one unit
//! - `memo` - the three-memo transport convention
//! - `transaction` - carrier payments, transaction ids and proposals
//! - `keylet` - addresses of module state slots
//! - `state` - read-only virtual ledger view and the client tag index
//!
//! ```text
//!   record ──sign──► SignedEnvelope ──encode──► MemoTriple
//!                                                  │
//!                                                  ▼
//!   module state ◄── keylet(slot) ◄── CarrierPayment(memos) ──► ledger
//! ```

pub mod envelope;
pub mod error;
pub mod keylet;
pub mod memo;
pub mod state;
pub mod transaction;

pub use envelope::*;
pub use error::*;
pub use keylet::*;
pub use memo::*;
pub use state::*;
pub use transaction::*;

/// Protocol prelude
pub mod prelude {
    pub use crate::envelope::SignedEnvelope;
    pub use crate::error::{ProtocolError, Result};
    pub use crate::keylet::{keylet, Slot};
    pub use crate::memo::{Memo, MemoField, MemoTriple};
    pub use crate::state::{ActorRecord, StateEntry, StateSnapshot, TagIndex, VirtualLedger};
    pub use crate::transaction::{CarrierPayment, SignedTransaction};
}
