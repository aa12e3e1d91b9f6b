//! GShare branch predictor.
//!
//! GShare correlates global branch history with the program counter using an XOR hash,
//! indexing a table of 2-bit saturating counters.
//!
//! # Performance
//!
//! - `predict_direction()` / `update_direction()`: O(1)
//! - Space: O(2^N) counters where N is the history length

use super::{BranchPredictor, btb::Btb};

/// GShare predictor structure.
#[derive(Clone, Debug)]
pub struct GSharePredictor {
    /// Pattern History Table of 2-bit counters, initialized weakly not-taken.
    pht: Vec<u8>,
    mask: u64,
    btb: Btb,
}

impl GSharePredictor {
    /// Creates a predictor indexed by `history_bits` bits of PC and history.
    pub fn new(history_bits: usize, btb_size: usize) -> Self {
        let size = 1usize << history_bits;
        Self {
            pht: vec![1; size],
            mask: size as u64 - 1,
            btb: Btb::new(btb_size),
        }
    }

    fn index(&self, pc: u64, history: u64) -> usize {
        (((pc >> 2) ^ history) & self.mask) as usize
    }
}

impl BranchPredictor for GSharePredictor {
    fn predict_direction(&self, pc: u64, history: u64) -> bool {
        self.pht[self.index(pc, history)] >= 2
    }

    fn update_direction(&mut self, pc: u64, history: u64, taken: bool) {
        let idx = self.index(pc, history);
        let counter = &mut self.pht[idx];
        if taken {
            *counter = (*counter + 1).min(3);
        } else {
            *counter = counter.saturating_sub(1);
        }
    }

    fn predict_btb(&self, pc: u64) -> Option<u64> {
        self.btb.lookup(pc)
    }

    fn update_btb(&mut self, pc: u64, target: u64) {
        self.btb.update(pc, target);
    }
}
