//! Pipeline stage implementations.
//!
//! This module contains the clocked units of the pipeline. Each stage plans its work in
//! `evaluate` against the pre-cycle state of the core and applies it in the returned update.
//! It includes:
//! 1. **Fetch:** Decodes and predicts a group of instructions for one thread.
//! 2. **Rename:** Maps logical registers to physical registers.
//! 3. **Dispatch:** Places ops into schedulers and memory-order queues.
//! 4. **Select:** Picks ready ops from every scheduler.
//! 5. **Retire:** Commits completed instructions in program order.
//!
//! Updates re-check what they planned: a recovery raised earlier in the same cycle may have
//! squashed a planned op.

/// Dispatch stage implementation.
pub mod dispatch;

/// Fetch stage implementation.
pub mod fetch;

/// Rename stage implementation.
pub mod rename;

/// Retirer (commit) implementation.
pub mod retire;

/// Select stage implementation.
pub mod select;

pub use dispatch::DispatchStage;
pub use fetch::FetchStage;
pub use rename::RenameStage;
pub use retire::Retirer;
pub use select::SelectStage;

use crate::core::Core;
use crate::sim::clock::Clocked;

/// Every stage, ordered so that consumers update before their producers within a cycle.
pub fn stage_units() -> Vec<Box<dyn Clocked<Core>>> {
    vec![
        Box::new(Retirer),
        Box::new(SelectStage),
        Box::new(DispatchStage),
        Box::new(RenameStage),
        Box::new(FetchStage),
    ]
}
