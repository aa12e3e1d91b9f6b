//! Branch predictor interface.
//!
//! This module defines the `BranchPredictor` trait that direction predictors implement.
//! Global history is owned by each hardware thread and passed in, so that it can be
//! checkpointed and restored with the rest of the speculative front-end state.

/// Trait for branch prediction algorithms.
pub trait BranchPredictor {
    /// Predicts whether the conditional branch at `pc` is taken.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the branch instruction
    /// * `history` - Global history of the fetching thread at prediction time
    fn predict_direction(&self, pc: u64, history: u64) -> bool;

    /// Trains the predictor with a committed branch outcome.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the branch instruction
    /// * `history` - The global history used when the branch was predicted
    /// * `taken` - Resolved direction
    fn update_direction(&mut self, pc: u64, history: u64, taken: bool);

    /// Looks up the target of the control transfer at `pc` in the BTB.
    fn predict_btb(&self, pc: u64) -> Option<u64>;

    /// Records the resolved target of a taken control transfer.
    fn update_btb(&mut self, pc: u64, target: u64);
}
