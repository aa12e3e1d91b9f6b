//! Hardware thread context.
//!
//! A core runs one hardware thread per simulated process. Each thread owns the structures that
//! must stay in its own program order:
//! 1. **Front end:** Fetch PC, fetch stall and sequence numbering.
//! 2. **Ordering:** The in-order list, the memory-order manager and the memory dependence
//!    predictor.
//! 3. **Speculative state:** A checkpoint master holding the rename map, the global branch
//!    history and the return address stack as providers.
//! 4. **Committed state:** Copies of those providers as of the last commit, used when an
//!    exception squashes every in-flight op.
//!
//! The op arena, the physical register file and the schedulers are shared between threads
//! and live in the core.

use crate::config::Config;
use crate::core::checkpoint::{CheckpointMaster, CheckpointSlot, DataHandle};
use crate::core::pipeline::inorder::InorderList;
use crate::core::recoverer::RecoveryStats;
use crate::core::regs::RenameMap;
use crate::core::units::bru::{GlobalHistory, Ras};
use crate::core::units::lsu::{MemDepPred, MemOrderManager};

/// Per-thread pipeline state.
#[derive(Debug)]
pub struct Thread {
    /// Hardware thread index.
    pub tid: usize,
    /// Simulated process run by this thread.
    pub pid: u32,
    /// False once the process exited.
    pub active: bool,
    /// Exit code reported by the process.
    pub exit_code: Option<u64>,
    /// Next address to fetch.
    pub fetch_pc: u64,
    /// Fetch stays idle before this cycle.
    pub fetch_stall_until: u64,
    /// Live ops in program order.
    pub inorder: InorderList,
    /// Load and store queues.
    pub mem_order: MemOrderManager,
    /// Predicts which store each memory op waits for.
    pub mem_dep: MemDepPred,
    /// Rollback points for the speculative front-end state.
    pub checkpoints: CheckpointMaster,
    /// Speculative rename map, backed up at rename.
    pub rename_map: DataHandle<RenameMap>,
    /// Speculative global history, backed up at fetch.
    pub history: DataHandle<GlobalHistory>,
    /// Speculative return address stack, backed up at fetch.
    pub ras: DataHandle<Ras>,
    /// Rename map of the committed state.
    pub committed_map: RenameMap,
    /// Global history of the committed state.
    pub committed_history: GlobalHistory,
    /// Return address stack of the committed state.
    pub committed_ras: Ras,
    /// Next per-thread op serial.
    pub next_serial: u64,
    /// Recoveries taken by this thread.
    pub recovery: RecoveryStats,
}

impl Thread {
    /// Creates thread `tid` running process `pid` from `entry_pc`.
    ///
    /// # Arguments
    ///
    /// * `tid` - Hardware thread index.
    /// * `pid` - Simulated process id.
    /// * `config` - Capacities and history length.
    /// * `map` - Initial logical-to-physical mapping, already backed by ready registers.
    /// * `entry_pc` - First address to fetch.
    pub fn new(tid: usize, pid: u32, config: &Config, map: RenameMap, entry_pc: u64) -> Self {
        let history = GlobalHistory::new(config.pipeline.gshare_history_bits);
        let mut checkpoints = CheckpointMaster::new(config.pipeline.checkpoint_capacity);
        let rename_map = checkpoints.register(map.clone(), CheckpointSlot::Rename);
        let history_handle = checkpoints.register(history, CheckpointSlot::Fetch);
        let ras = Ras::new(config.pipeline.ras_size);
        let ras_handle = checkpoints.register(ras.clone(), CheckpointSlot::Fetch);
        Self {
            tid,
            pid,
            active: true,
            exit_code: None,
            fetch_pc: entry_pc,
            fetch_stall_until: 0,
            inorder: InorderList::new(config.pipeline.inorder_list_capacity),
            mem_order: MemOrderManager::new(&config.memory),
            mem_dep: MemDepPred::new(&config.memory),
            checkpoints,
            rename_map,
            history: history_handle,
            ras: ras_handle,
            committed_map: map,
            committed_history: history,
            committed_ras: ras,
            next_serial: 0,
            recovery: RecoveryStats::default(),
        }
    }

    /// Current speculative rename map.
    pub fn map(&self) -> &RenameMap {
        self.checkpoints.data(self.rename_map)
    }

    /// Current speculative global history.
    pub fn speculative_history(&self) -> GlobalHistory {
        *self.checkpoints.data(self.history)
    }

    /// Current speculative return address stack.
    pub fn return_stack(&self) -> &Ras {
        self.checkpoints.data(self.ras)
    }

    /// Resets every speculative provider to the committed state.
    pub fn reset_to_committed(&mut self) {
        let (map, history, ras) = (self.rename_map, self.history, self.ras);
        *self.checkpoints.data_mut(map) = self.committed_map.clone();
        *self.checkpoints.data_mut(history) = self.committed_history;
        *self.checkpoints.data_mut(ras) = self.committed_ras.clone();
    }

    /// True once the process exited and every op has left the pipeline.
    pub fn is_finished(&self) -> bool {
        !self.active && self.inorder.is_empty()
    }
}
