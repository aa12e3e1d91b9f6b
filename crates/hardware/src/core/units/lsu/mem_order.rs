//! Memory order manager.
//!
//! Each thread owns one `MemOrderManager`. It keeps the thread's in-flight loads and stores in
//! program order and provides:
//! 1. **Admission:** `can_allocate` / `allocate` against a unified or split queue capacity.
//! 2. **Disambiguation:** `read` finds the nearest older executed store that overlaps a load,
//!    forwarding from it, flagging a partial read, or falling back to the memory image.
//! 3. **Violation detection:** `finished` reports access-order violations when a store
//!    finishes after a younger overlapping load already executed, and partial-read loads.
//! 4. **Release:** `commit` applies stores to the memory image and the data cache; `retire`
//!    and `flush` drop entries.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{trace, warn};

use super::operations::{contains, merge_partial_access, overlaps, read_previous_access};
use crate::common::{MemAccess, MemAccessResult};
use crate::config::MemoryConfig;
use crate::core::op::{OpArena, OpHandle};
use crate::core::units::cache::CacheIf;
use crate::emu::{MemImage, OpClass};

/// Memory-order counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemOrderStats {
    /// Loads executed, including re-executions.
    pub executed_loads: u64,
    /// Executed loads satisfied by store-to-load forwarding.
    pub executed_forwardings: u64,
    /// Loads committed.
    pub retired_loads: u64,
    /// Committed loads that had been forwarded.
    pub retired_forwardings: u64,
}

/// Ordering hazard found when an op finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemViolation {
    /// `load` executed before the older overlapping `store` produced its value.
    AccessOrder {
        /// The store that just finished.
        store: OpHandle,
        /// The younger load that read stale data.
        load: OpHandle,
    },
    /// `load` partially overlapped an in-flight store and could not be forwarded.
    PartialLoad {
        /// The overlapping store, if it is still in flight.
        store: Option<OpHandle>,
        /// The load.
        load: OpHandle,
    },
}

/// Outcome of a load's memory read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadResult {
    /// The access with its value and result code filled in.
    pub access: MemAccess,
    /// Global serial of the store the value was forwarded from.
    pub forwarded_from: Option<u64>,
}

/// Per-thread load and store queues.
#[derive(Debug)]
pub struct MemOrderManager {
    unified_capacity: Option<usize>,
    load_capacity: usize,
    store_capacity: usize,
    ideal_partial_load: bool,
    remove_ops_on_commit: bool,
    loads: VecDeque<OpHandle>,
    stores: VecDeque<OpHandle>,
    stats: MemOrderStats,
}

impl MemOrderManager {
    /// Creates empty queues sized by `config`.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            unified_capacity: config.unified_capacity,
            load_capacity: config.load_queue_capacity,
            store_capacity: config.store_queue_capacity,
            ideal_partial_load: config.ideal_partial_load,
            remove_ops_on_commit: config.remove_ops_on_commit,
            loads: VecDeque::new(),
            stores: VecDeque::new(),
            stats: MemOrderStats::default(),
        }
    }

    /// Loads in program order.
    pub fn loads(&self) -> impl Iterator<Item = OpHandle> + '_ {
        self.loads.iter().copied()
    }

    /// Stores in program order.
    pub fn stores(&self) -> impl Iterator<Item = OpHandle> + '_ {
        self.stores.iter().copied()
    }

    /// Entries currently held.
    pub fn len(&self) -> usize {
        self.loads.len() + self.stores.len()
    }

    /// True if no entry is held.
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty() && self.stores.is_empty()
    }

    /// Counters.
    pub fn stats(&self) -> MemOrderStats {
        self.stats
    }

    /// True if the queues can take every memory op among `classes`.
    pub fn can_allocate(&self, classes: &[OpClass]) -> bool {
        let loads = classes.iter().filter(|c| c.is_load()).count();
        let stores = classes.iter().filter(|c| c.is_store()).count();
        match self.unified_capacity {
            Some(cap) => self.len() + loads + stores <= cap,
            None => {
                self.loads.len() + loads <= self.load_capacity
                    && self.stores.len() + stores <= self.store_capacity
            }
        }
    }

    /// Inserts a load or store in program order. Other ops are ignored.
    pub fn allocate(&mut self, ops: &OpArena, handle: OpHandle) {
        let op = &ops[handle];
        let queue = match op.info.class {
            OpClass::Load => &mut self.loads,
            OpClass::Store => &mut self.stores,
            _ => return,
        };
        let serial = op.global_serial;
        let pos = queue.partition_point(|&h| ops[h].global_serial < serial);
        queue.insert(pos, handle);
    }

    /// Finds the nearest older store that has executed and overlaps `access`.
    pub fn producer_store(
        &self,
        ops: &OpArena,
        load: OpHandle,
        access: &MemAccess,
    ) -> Option<OpHandle> {
        let serial = ops[load].global_serial;
        self.stores.iter().rev().copied().find(|&h| {
            let store = &ops[h];
            store.global_serial < serial
                && store.status.has_executed()
                && !store.status.is_committed()
                && store.mem.is_some_and(|m| overlaps(&m, access))
        })
    }

    /// Performs a load's read.
    ///
    /// # Arguments
    ///
    /// * `ops` - Op storage.
    /// * `load` - The executing load.
    /// * `access` - Address and size to read.
    /// * `image` - Committed memory, used when no store supplies the bytes.
    ///
    /// # Returns
    ///
    /// The filled access. A partially overlapping producer leaves the result
    /// `ReadInvalidPartialRead` unless ideal partial loads are enabled.
    pub fn read(
        &mut self,
        ops: &OpArena,
        load: OpHandle,
        mut access: MemAccess,
        image: &dyn MemImage,
    ) -> LoadResult {
        self.stats.executed_loads += 1;
        let endian = image.endian();
        let Some(store) = self.producer_store(ops, load, &access) else {
            image.read(&mut access);
            return LoadResult {
                access,
                forwarded_from: None,
            };
        };
        let producer = &ops[store];
        let written = producer.mem.unwrap_or_default();

        if contains(&written, &access) {
            access.value = read_previous_access(&access, &written, endian);
            access.result = MemAccessResult::Success;
            self.stats.executed_forwardings += 1;
            trace!(load = %load, store = %store, value = access.value, "forwarded");
            return LoadResult {
                access,
                forwarded_from: Some(producer.global_serial),
            };
        }

        if self.ideal_partial_load {
            image.read(&mut access);
            let serial = ops[load].global_serial;
            for &h in &self.stores {
                let older = &ops[h];
                if older.global_serial >= serial {
                    break;
                }
                if !older.status.has_executed() || older.status.is_committed() {
                    continue;
                }
                if let Some(m) = older.mem.filter(|m| overlaps(m, &access)) {
                    access.value = merge_partial_access(&access, &m, endian);
                }
            }
        } else {
            access.result = MemAccessResult::ReadInvalidPartialRead;
        }
        LoadResult {
            access,
            forwarded_from: None,
        }
    }

    /// Records a store's address and value. Memory is written at commit.
    pub fn write(ops: &mut OpArena, store: OpHandle, access: MemAccess) {
        ops[store].mem = Some(access);
    }

    /// Younger executed loads that overlap `store`, in program order.
    pub fn consumer_loads(&self, ops: &OpArena, store: OpHandle) -> Vec<OpHandle> {
        let producer = &ops[store];
        let Some(written) = producer.mem else {
            return Vec::new();
        };
        self.loads
            .iter()
            .copied()
            .filter(|&h| {
                let load = &ops[h];
                load.global_serial > producer.global_serial
                    && load.status.has_executed()
                    && load.mem.is_some_and(|m| overlaps(&m, &written))
            })
            .collect()
    }

    /// Checks a finishing op for memory-ordering hazards.
    ///
    /// A load that forwarded from this store or from a younger one read correct data and is
    /// not reported.
    pub fn finished(&self, ops: &OpArena, handle: OpHandle) -> Option<MemViolation> {
        let op = &ops[handle];
        match op.info.class {
            OpClass::Store => {
                let serial = op.global_serial;
                self.consumer_loads(ops, handle)
                    .into_iter()
                    .find(|&h| !ops[h].forwarded_from.is_some_and(|f| f >= serial))
                    .map(|load| MemViolation::AccessOrder {
                        store: handle,
                        load,
                    })
            }
            OpClass::Load => {
                let access = op.mem?;
                (access.result == MemAccessResult::ReadInvalidPartialRead).then(|| {
                    MemViolation::PartialLoad {
                        store: self.producer_store(ops, handle, &access),
                        load: handle,
                    }
                })
            }
            _ => None,
        }
    }

    /// Commits a load or store.
    ///
    /// # Returns
    ///
    /// The data-cache latency of a committed store, zero otherwise.
    pub fn commit(
        &mut self,
        ops: &OpArena,
        handle: OpHandle,
        image: &mut dyn MemImage,
        cache: &mut dyn CacheIf,
        now: u64,
    ) -> u64 {
        let op = &ops[handle];
        let mut latency = 0;
        match op.info.class {
            OpClass::Store => {
                if let Some(mut access) = op.mem {
                    image.write(&mut access);
                    if access.result != MemAccessResult::Success {
                        warn!(
                            op = %handle,
                            address = access.address,
                            size = access.size,
                            result = ?access.result,
                            "store commit was rejected by the memory image"
                        );
                    }
                    latency = cache.write(&access, now).latency;
                }
            }
            OpClass::Load => {
                self.stats.retired_loads += 1;
                if op.forwarded_from.is_some() {
                    self.stats.retired_forwardings += 1;
                }
            }
            _ => return 0,
        }
        if self.remove_ops_on_commit {
            self.remove(handle);
        }
        latency
    }

    /// Drops a retiring op's entry if commit did not already.
    pub fn retire(&mut self, handle: OpHandle) {
        self.remove(handle);
    }

    /// Drops a squashed op's entry.
    pub fn flush(&mut self, handle: OpHandle) {
        self.remove(handle);
    }

    fn remove(&mut self, handle: OpHandle) {
        for queue in [&mut self.loads, &mut self.stores] {
            if let Some(pos) = queue.iter().position(|&h| h == handle) {
                let _ = queue.remove(pos);
                return;
            }
        }
    }
}
