//! Static branch predictor.
//!
//! Predicts every conditional branch the same way. Targets of taken branches come from
//! decode, or from the BTB for indirect jumps.

use super::{BranchPredictor, btb::Btb};

/// Static predictor structure.
#[derive(Clone, Debug)]
pub struct StaticPredictor {
    taken: bool,
    btb: Btb,
}

impl StaticPredictor {
    /// Creates a predictor that always answers `taken`.
    ///
    /// # Arguments
    ///
    /// * `taken` - The fixed direction prediction.
    /// * `btb_size` - Number of entries in the BTB.
    pub fn new(taken: bool, btb_size: usize) -> Self {
        Self {
            taken,
            btb: Btb::new(btb_size),
        }
    }
}

impl BranchPredictor for StaticPredictor {
    fn predict_direction(&self, _pc: u64, _history: u64) -> bool {
        self.taken
    }

    fn update_direction(&mut self, _pc: u64, _history: u64, _taken: bool) {}

    fn predict_btb(&self, pc: u64) -> Option<u64> {
        self.btb.lookup(pc)
    }

    fn update_btb(&mut self, pc: u64, target: u64) {
        self.btb.update(pc, target);
    }
}
