//! Issue queues.
//!
//! A scheduler owns the dispatched ops of the op classes its execution units handle. Each op
//! sits in exactly one of three sets:
//! 1. **Not ready:** At least one source has not been woken for this scheduler.
//! 2. **Ready:** Every source is ready; the op waits for selection.
//! 3. **Issued:** Selected and still holding a window slot, as the remove policy dictates.
//!
//! Selection is width-bounded and delegated to a `Selector`. Execution unit availability at
//! the arrival cycle is checked before an op is picked, and a memory op predicted to depend
//! on a store is passed over until that store executes. `reschedule` returns an issued op to
//! the ready or not-ready set for recovery.

/// Select policies.
pub mod selector;

pub use selector::{OldestFirst, Selector};

use crate::config::{RemovePolicy, SchedulerConfig};
use crate::core::op::{Op, OpArena, OpHandle};
use crate::core::regs::RegisterFile;
use crate::core::units::exec::ExecUnitPool;
use crate::core::units::lsu::waits_for_store;
use crate::emu::OpClass;

/// Set an op occupies inside a scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for a source.
    NotReady,
    /// Waiting for selection.
    Ready,
    /// Selected.
    Issued,
}

/// One issue queue and its execution units.
#[derive(Debug)]
pub struct Scheduler {
    index: usize,
    name: String,
    issue_width: usize,
    capacity: usize,
    issue_latency: u64,
    remove_policy: RemovePolicy,
    com_latencies: Vec<Option<u64>>,
    units: ExecUnitPool,
    selector: Box<dyn Selector>,
    not_ready: Vec<OpHandle>,
    ready: Vec<OpHandle>,
    issued: Vec<OpHandle>,
}

impl Scheduler {
    /// Creates scheduler `index` of `count`.
    ///
    /// # Arguments
    ///
    /// * `index` - Position in the scheduler list; also its ready-bit index.
    /// * `config` - Widths, latencies and execution units.
    /// * `remove_policy` - Effective remove policy for this scheduler.
    /// * `count` - Total number of schedulers, for communication latencies.
    pub fn new(
        index: usize,
        config: &SchedulerConfig,
        remove_policy: RemovePolicy,
        count: usize,
    ) -> Self {
        Self {
            index,
            name: config.name.clone(),
            issue_width: config.issue_width,
            capacity: config.window_capacity,
            issue_latency: config.issue_latency,
            remove_policy,
            com_latencies: (0..count)
                .map(|t| config.communication_latency(t))
                .collect(),
            units: ExecUnitPool::new(config),
            selector: Box::new(OldestFirst),
            not_ready: Vec::new(),
            ready: Vec::new(),
            issued: Vec::new(),
        }
    }

    /// Replaces the select policy.
    pub fn set_selector(&mut self, selector: Box<dyn Selector>) {
        self.selector = selector;
    }

    /// Position in the scheduler list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name from the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cycles from select to execution.
    pub fn issue_latency(&self) -> u64 {
        self.issue_latency
    }

    /// Effective remove policy.
    pub fn remove_policy(&self) -> RemovePolicy {
        self.remove_policy
    }

    /// True if this scheduler's units execute `class`.
    pub fn handles(&self, class: OpClass) -> bool {
        self.units.group_of(class).is_some()
    }

    /// Execution latency of `class` on this scheduler's units.
    pub fn exec_latency(&self, class: OpClass) -> u64 {
        self.units.latency(class).unwrap_or(1)
    }

    /// Extra wake-up latency toward scheduler `target`, or `None` if it is never woken.
    pub fn communication_latency(&self, target: usize) -> Option<u64> {
        self.com_latencies.get(target).copied().flatten()
    }

    /// Execution units.
    pub fn units_mut(&mut self) -> &mut ExecUnitPool {
        &mut self.units
    }

    /// Ops held in any set.
    pub fn len(&self) -> usize {
        self.not_ready.len() + self.ready.len() + self.issued.len()
    }

    /// True if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `n` more ops fit in the window.
    pub fn can_allocate(&self, n: usize) -> bool {
        self.len() + n <= self.capacity
    }

    /// Set currently holding `op`.
    pub fn state_of(&self, op: OpHandle) -> Option<EntryState> {
        if self.not_ready.contains(&op) {
            Some(EntryState::NotReady)
        } else if self.ready.contains(&op) {
            Some(EntryState::Ready)
        } else if self.issued.contains(&op) {
            Some(EntryState::Issued)
        } else {
            None
        }
    }

    fn insert_waiting(&mut self, regs: &RegisterFile, op: &Op) {
        if regs.all_ready(&op.srcs, self.index) {
            self.ready.push(op.handle);
        } else {
            self.not_ready.push(op.handle);
        }
    }

    /// Admits a dispatched op.
    pub fn dispatch_end(&mut self, regs: &RegisterFile, op: &Op) {
        self.insert_waiting(regs, op);
    }

    /// Re-evaluates a waiting op after one of its sources was woken.
    ///
    /// # Returns
    ///
    /// True if the op moved to the ready set.
    pub fn wakeup(&mut self, regs: &RegisterFile, op: &Op) -> bool {
        let Some(pos) = self.not_ready.iter().position(|&h| h == op.handle) else {
            return false;
        };
        if !regs.all_ready(&op.srcs, self.index) {
            return false;
        }
        let h = self.not_ready.swap_remove(pos);
        self.ready.push(h);
        true
    }

    /// Picks the ops to select this cycle.
    ///
    /// # Arguments
    ///
    /// * `ops` - Op storage.
    /// * `now` - Current cycle; units are checked for `now + issue_latency`.
    /// * `memory_stalled` - True while the cache cannot accept new memory ops.
    pub fn plan_select(&self, ops: &OpArena, now: u64, memory_stalled: bool) -> Vec<OpHandle> {
        let arrive = now + self.issue_latency;
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut picked = Vec::with_capacity(self.issue_width);
        for h in self.selector.order(ops, &self.ready) {
            if picked.len() >= self.issue_width {
                break;
            }
            let class = ops[h].info.class;
            if memory_stalled && class.is_mem() {
                continue;
            }
            if waits_for_store(ops, &ops[h]) {
                continue;
            }
            let Some(group) = self.units.group_of(class) else {
                continue;
            };
            let used = taken
                .iter()
                .find(|(g, _)| *g == group)
                .map_or(0, |&(_, n)| n);
            if self.units.free_count(group, arrive) <= used {
                continue;
            }
            match taken.iter_mut().find(|(g, _)| *g == group) {
                Some(entry) => entry.1 += 1,
                None => taken.push((group, 1)),
            }
            picked.push(h);
        }
        picked
    }

    /// Moves a selected op out of the ready set and reserves its execution unit.
    ///
    /// # Returns
    ///
    /// False if the op is no longer ready or no unit is free; nothing changes then.
    pub fn issue(&mut self, op: &Op, now: u64) -> bool {
        let Some(pos) = self.ready.iter().position(|&h| h == op.handle) else {
            return false;
        };
        let Some(group) = self.units.group_of(op.info.class) else {
            return false;
        };
        if !self.units.reserve(group, now + self.issue_latency) {
            return false;
        }
        let h = self.ready.remove(pos);
        if self.remove_policy != RemovePolicy::Remove {
            self.issued.push(h);
        }
        true
    }

    /// Notes that an issued op finished.
    pub fn finished(&mut self, op: OpHandle) {
        if self.remove_policy == RemovePolicy::RemoveAfterFinish {
            self.issued.retain(|&h| h != op);
        }
    }

    /// Drops an op from every set (commit or flush).
    pub fn remove(&mut self, op: OpHandle) {
        self.not_ready.retain(|&h| h != op);
        self.ready.retain(|&h| h != op);
        self.issued.retain(|&h| h != op);
    }

    /// Returns an op to the waiting sets for re-execution.
    ///
    /// An issued op moves to the ready or not-ready set. An op that had already left the
    /// window is admitted again. A ready op whose sources were reset moves back to not-ready.
    ///
    /// # Returns
    ///
    /// True if the op will issue again.
    pub fn reschedule(&mut self, regs: &RegisterFile, op: &Op) -> bool {
        let h = op.handle;
        match self.state_of(h) {
            Some(EntryState::Issued) => {
                self.issued.retain(|&x| x != h);
                self.insert_waiting(regs, op);
                true
            }
            None => {
                self.insert_waiting(regs, op);
                true
            }
            Some(EntryState::Ready) => {
                if !regs.all_ready(&op.srcs, self.index) {
                    self.ready.retain(|&x| x != h);
                    self.not_ready.push(h);
                }
                false
            }
            Some(EntryState::NotReady) => false,
        }
    }
}
