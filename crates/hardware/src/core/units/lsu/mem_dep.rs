//! Memory dependence prediction.
//!
//! Rename asks the predictor which older store a memory op should wait for, and select holds
//! the op until that store has started executing. Three predictors are provided:
//! 1. **Optimistic:** Nothing waits; every access-order violation is recovered.
//! 2. **Conservative:** Stores execute in order and each load waits for the youngest older
//!    store, so no load ever passes a store.
//! 3. **Store set:** A load and a store that once violated are put into one store set. Each
//!    memory op of a set waits for the last fetched store of that set.
//!
//! The store set tables follow the usual layout: the store set id table (SSIT) maps PCs to
//! set ids, and the last fetched store table (LFST) maps set ids to the youngest in-flight
//! store of the set. A new set takes the SSIT index of its store as its id.

use serde::Serialize;

use crate::config::{MemDepPredictor, MemoryConfig};
use crate::core::op::{Op, OpArena, OpHandle, OpStatus};
use crate::emu::OpClass;

/// Memory dependence predictor counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemDepStats {
    /// Access-order violations the predictor was trained with.
    pub conflicts: u64,
    /// Memory ops given a store to wait for.
    pub dependences: u64,
}

/// Per-thread memory dependence predictor.
#[derive(Clone, Debug)]
pub struct MemDepPred {
    kind: MemDepPredictor,
    mask: usize,
    ssit: Vec<Option<usize>>,
    lfst: Vec<Option<OpHandle>>,
    /// Youngest in-flight store, for the conservative predictor.
    last_store: Option<OpHandle>,
    stats: MemDepStats,
}

impl MemDepPred {
    /// Creates the predictor selected by the memory configuration.
    pub fn new(config: &MemoryConfig) -> Self {
        let entries: usize = match config.dependence_predictor {
            MemDepPredictor::StoreSet => 1 << config.store_set_table_bits,
            MemDepPredictor::Optimistic | MemDepPredictor::Conservative => 0,
        };
        Self {
            kind: config.dependence_predictor,
            mask: entries.saturating_sub(1),
            ssit: vec![None; entries],
            lfst: vec![None; entries],
            last_store: None,
            stats: MemDepStats::default(),
        }
    }

    /// Predictor type.
    pub fn kind(&self) -> MemDepPredictor {
        self.kind
    }

    /// Counters.
    pub fn stats(&self) -> MemDepStats {
        self.stats
    }

    fn index(&self, pc: u64) -> usize {
        (pc >> 2) as usize & self.mask
    }

    /// Predicts the store a renamed op waits for, and records the op if it is a store.
    ///
    /// Ops must be renamed in program order, so the returned store is always older.
    pub fn rename(&mut self, h: OpHandle, pc: u64, class: OpClass) -> Option<OpHandle> {
        if !class.is_mem() {
            return None;
        }
        let producer = match self.kind {
            MemDepPredictor::Optimistic => None,
            MemDepPredictor::Conservative => {
                let producer = self.last_store;
                if class.is_store() {
                    self.last_store = Some(h);
                }
                producer
            }
            MemDepPredictor::StoreSet => {
                let set = self.ssit[self.index(pc)];
                let producer = set.and_then(|id| self.lfst[id]);
                if let Some(id) = set.filter(|_| class.is_store()) {
                    self.lfst[id] = Some(h);
                }
                producer
            }
        };
        if producer.is_some() {
            self.stats.dependences += 1;
        }
        producer
    }

    /// Forgets store `h` at commit or flush if it is still the youngest of its set.
    pub fn release(&mut self, h: OpHandle, pc: u64) {
        if self.last_store == Some(h) {
            self.last_store = None;
        }
        if self.kind == MemDepPredictor::StoreSet {
            let index = self.index(pc);
            if let Some(id) = self.ssit[index].filter(|&id| self.lfst[id] == Some(h)) {
                self.lfst[id] = None;
            }
        }
    }

    /// Trains on a load at `load_pc` that executed before an older store at `store_pc` to
    /// the same address.
    pub fn order_conflicted(&mut self, store_pc: u64, load_pc: u64) {
        self.stats.conflicts += 1;
        if self.kind != MemDepPredictor::StoreSet {
            return;
        }
        let (s, l) = (self.index(store_pc), self.index(load_pc));
        let id = match (self.ssit[s], self.ssit[l]) {
            (None, None) => s,
            (Some(id), None) | (None, Some(id)) => id,
            (Some(a), Some(b)) => a.min(b),
        };
        self.ssit[s] = Some(id);
        self.ssit[l] = Some(id);
    }
}

/// True while `op` waits for its predicted store to start executing.
///
/// A store that was flushed or retired since no longer holds anything back.
pub fn waits_for_store(ops: &OpArena, op: &Op) -> bool {
    op.mem_dep
        .and_then(|store| ops.get(store))
        .is_some_and(|store| (OpStatus::Fetch..OpStatus::Executing).contains(&store.status))
}
