//! Explicit per-key sequence source
//!
//! Records carry a sequence that must be strictly greater than the last one the
//! module accepted for the same key. The counter is a plain value owned by the
//! caller: it never reads a clock on its own, and callers persist it between
//! runs. Two records drawn from the same counter can never share a sequence.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Strictly increasing sequence source for one signing key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    /// Last value handed out or observed
    last: u32,
}

impl SequenceCounter {
    /// Start after `last`; the first `next()` returns `last + 1`
    pub fn new(last: u32) -> Self {
        Self { last }
    }

    /// Seed from a caller-supplied unix time in seconds.
    ///
    /// Useful for keys whose module-side history was built with
    /// seconds-since-epoch sequences. The counter still increments from here.
    pub fn from_unix_time(secs: u64) -> Self {
        Self {
            last: u32::try_from(secs).unwrap_or(u32::MAX),
        }
    }

    /// Last value handed out or observed
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Claim the next sequence
    pub fn next(&mut self) -> Result<u32> {
        self.last = self
            .last
            .checked_add(1)
            .ok_or_else(|| CodecError::InvalidValue {
                field: "Sequence",
                reason: "sequence space exhausted".to_string(),
            })?;
        Ok(self.last)
    }

    /// Move past a sequence the module reports as accepted
    pub fn observe(&mut self, last_accepted: u32) {
        self.last = self.last.max(last_accepted);
    }
}
