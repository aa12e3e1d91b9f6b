//! Branch prediction unit (BRU).
//!
//! This module contains the direction predictors (static and gshare), the branch target
//! buffer, and the per-thread global history and return address stack. Fetch asks the
//! wrapper for the next PC of each control-transfer op; commit trains it.

pub use self::branch_predictor::BranchPredictor;
pub use self::history::GlobalHistory;
pub use self::ras::Ras;

/// Branch predictor trait.
pub mod branch_predictor;

/// Branch Target Buffer for indirect jump targets.
pub mod btb;

/// Global history branch predictor (gshare algorithm).
pub mod gshare;

/// Speculative global history register.
pub mod history;

/// Return address stack.
pub mod ras;

/// Static branch predictor (always taken or always not-taken).
pub mod static_bp;

use self::{gshare::GSharePredictor, static_bp::StaticPredictor};
use crate::config::{BranchPredictor as BpType, PipelineConfig};
use crate::emu::{OpClass, OpInfo};

/// Fetch-time prediction for one op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prediction {
    /// Predicted address of the next instruction.
    pub next_pc: u64,
    /// Predicted direction of a conditional branch.
    pub taken: Option<bool>,
}

/// Enum wrapper for static dispatch of branch predictors.
#[derive(Clone, Debug)]
pub enum BranchPredictorWrapper {
    /// Fixed-direction predictor.
    Static(StaticPredictor),
    /// Gshare predictor.
    GShare(GSharePredictor),
}

impl BranchPredictorWrapper {
    /// Creates the predictor selected by the pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        match config.branch_predictor {
            BpType::StaticNotTaken => Self::Static(StaticPredictor::new(false, config.btb_size)),
            BpType::StaticTaken => Self::Static(StaticPredictor::new(true, config.btb_size)),
            BpType::GShare => Self::GShare(GSharePredictor::new(
                config.gshare_history_bits,
                config.btb_size,
            )),
        }
    }

    /// Predicts the successor of the op described by `info` at `pc`.
    ///
    /// Only the last micro-op of an instruction transfers control; other micro-ops fall
    /// through to the same PC's successor.
    pub fn predict(&self, pc: u64, info: &OpInfo, history: u64) -> Prediction {
        let fallthrough = info.fallthrough;
        if !info.is_last_micro_op() {
            return Prediction {
                next_pc: fallthrough,
                taken: None,
            };
        }
        match info.class {
            OpClass::Branch => {
                let target = info.target.or_else(|| self.predict_btb(pc));
                let taken = self.predict_direction(pc, history) && target.is_some();
                Prediction {
                    next_pc: if taken {
                        target.unwrap_or(fallthrough)
                    } else {
                        fallthrough
                    },
                    taken: Some(taken),
                }
            }
            OpClass::Jump => Prediction {
                next_pc: info
                    .target
                    .or_else(|| self.predict_btb(pc))
                    .unwrap_or(fallthrough),
                taken: None,
            },
            _ => Prediction {
                next_pc: fallthrough,
                taken: None,
            },
        }
    }

    /// Trains the predictor with a committed control transfer.
    pub fn train(&mut self, pc: u64, info: &OpInfo, history: u64, next_pc: u64) {
        let taken = next_pc != info.fallthrough;
        if info.class == OpClass::Branch {
            self.update_direction(pc, history, taken);
        }
        if taken {
            self.update_btb(pc, next_pc);
        }
    }
}

impl BranchPredictor for BranchPredictorWrapper {
    #[inline(always)]
    fn predict_direction(&self, pc: u64, history: u64) -> bool {
        match self {
            Self::Static(bp) => bp.predict_direction(pc, history),
            Self::GShare(bp) => bp.predict_direction(pc, history),
        }
    }

    #[inline(always)]
    fn update_direction(&mut self, pc: u64, history: u64, taken: bool) {
        match self {
            Self::Static(bp) => bp.update_direction(pc, history, taken),
            Self::GShare(bp) => bp.update_direction(pc, history, taken),
        }
    }

    #[inline(always)]
    fn predict_btb(&self, pc: u64) -> Option<u64> {
        match self {
            Self::Static(bp) => bp.predict_btb(pc),
            Self::GShare(bp) => bp.predict_btb(pc),
        }
    }

    #[inline(always)]
    fn update_btb(&mut self, pc: u64, target: u64) {
        match self {
            Self::Static(bp) => bp.update_btb(pc, target),
            Self::GShare(bp) => bp.update_btb(pc, target),
        }
    }
}
