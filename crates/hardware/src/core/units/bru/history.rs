//! Speculative global branch history.
//!
//! Each thread shifts its predicted directions into a `GlobalHistory` at fetch. The
//! history is checkpointed with the fetch-time snapshot, so a misprediction restores it to
//! the state right after the mispredicted branch and then corrects that branch's bit.

/// Global history register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalHistory {
    bits: u64,
    mask: u64,
}

impl GlobalHistory {
    /// Creates an all-not-taken history of `len` bits (at most 64).
    pub fn new(len: usize) -> Self {
        let mask = if len >= 64 { u64::MAX } else { (1u64 << len) - 1 };
        Self { bits: 0, mask }
    }

    /// Current history bits, most recent branch in bit 0.
    pub fn value(&self) -> u64 {
        self.bits
    }

    /// Shifts in a branch direction.
    pub fn push(&mut self, taken: bool) {
        self.bits = ((self.bits << 1) | u64::from(taken)) & self.mask;
    }

    /// Overwrites the most recent direction.
    pub fn set_last(&mut self, taken: bool) {
        self.bits = (self.bits & !1) | u64::from(taken);
    }
}
