//! # Relay Core
//!
//! Canonical data layer for the signed instruction relay.
//!
//! - `codec` - field-coded binary objects with a single canonical encoding
//! - `address` - classic account address encoding
//! - `instruction` - typed instruction records and their canonical form
//! - `sequence` - explicit per-key replay counter
//!
//! ```text
//!   LitePayment / ListUpdate / Proposal
//!              │ to_object
//!              ▼
//!          StObject ──► canonical bytes ──► signed by the actor
//! ```

pub mod address;
pub mod codec;
pub mod error;
pub mod instruction;
pub mod sequence;
pub mod types;

pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{sf, FieldId, StObject, TypeCode, Value};
    pub use crate::error::{CodecError, Result};
    pub use crate::instruction::{
        Instruction, InstructionKind, InstructionRecord, ListOperation, ListUpdate, LitePayment,
        Proposal,
    };
    pub use crate::sequence::SequenceCounter;
    pub use crate::types::*;
}
