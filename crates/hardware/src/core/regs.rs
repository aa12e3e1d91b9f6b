//! Physical register file and rename map.
//!
//! This module holds the renamed register state shared by every thread. It provides:
//! 1. **Storage:** One value per physical register, written when the producing op finishes.
//! 2. **Readiness:** A per-scheduler ready bit per register. A register is fully ready once
//!    every scheduler has seen its producer's wake-up.
//! 3. **Dependency edges:** The consumer list of each register, which is the
//!    producer-to-consumer graph walked by wake-up and selective reissue.
//! 4. **Allocation:** A FIFO free list.
//! 5. **Mapping:** `RenameMap`, the per-thread logical-to-physical table. It is a
//!    checkpointed provider, so recovery restores it wholesale.

use std::collections::VecDeque;
use std::fmt;

use crate::common::{SimError, SimResult};
use crate::core::op::OpHandle;

/// Physical register index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysReg(pub u32);

impl PhysReg {
    /// Index into register file tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Physical register file shared by all threads.
#[derive(Debug)]
pub struct RegisterFile {
    values: Vec<u64>,
    ready: Vec<u64>,
    consumers: Vec<Vec<OpHandle>>,
    free: VecDeque<PhysReg>,
    full_mask: u64,
}

impl RegisterFile {
    /// Creates `count` free registers tracked for `schedulers` schedulers.
    ///
    /// # Returns
    ///
    /// `SimError::Config` if there are more schedulers than ready bits.
    pub fn new(count: usize, schedulers: usize) -> SimResult<Self> {
        if schedulers == 0 || schedulers > 64 {
            return Err(SimError::config(format!(
                "{schedulers} schedulers cannot be tracked (1..=64 supported)"
            )));
        }
        let full_mask = if schedulers == 64 {
            u64::MAX
        } else {
            (1u64 << schedulers) - 1
        };
        Ok(Self {
            values: vec![0; count],
            ready: vec![0; count],
            consumers: vec![Vec::new(); count],
            free: (0..count as u32).map(PhysReg).collect(),
            full_mask,
        })
    }

    /// Total registers.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Registers on the free list.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Takes a register off the free list. Its readiness is cleared.
    pub fn allocate(&mut self) -> Option<PhysReg> {
        let reg = self.free.pop_front()?;
        self.ready[reg.index()] = 0;
        self.consumers[reg.index()].clear();
        Some(reg)
    }

    /// Returns a register to the free list.
    pub fn release(&mut self, reg: PhysReg) {
        self.ready[reg.index()] = 0;
        self.consumers[reg.index()].clear();
        self.free.push_back(reg);
    }

    /// Current value.
    pub fn value(&self, reg: PhysReg) -> u64 {
        self.values[reg.index()]
    }

    /// Writes a value.
    pub fn set_value(&mut self, reg: PhysReg, value: u64) {
        self.values[reg.index()] = value;
    }

    /// True if consumers in scheduler `scheduler` may read the register.
    pub fn is_ready(&self, reg: PhysReg, scheduler: usize) -> bool {
        self.ready[reg.index()] & (1 << scheduler) != 0
    }

    /// True once every scheduler has been woken for this register.
    pub fn is_fully_ready(&self, reg: PhysReg) -> bool {
        self.ready[reg.index()] == self.full_mask
    }

    /// Marks the register ready for one scheduler.
    pub fn set_ready(&mut self, reg: PhysReg, scheduler: usize) {
        self.ready[reg.index()] |= 1 << scheduler;
    }

    /// Marks the register ready for every scheduler.
    pub fn set_fully_ready(&mut self, reg: PhysReg) {
        self.ready[reg.index()] = self.full_mask;
    }

    /// Clears every ready bit. Used when the producer is rescheduled.
    pub fn reset_ready(&mut self, reg: PhysReg) {
        self.ready[reg.index()] = 0;
    }

    /// True if every register in `srcs` is ready for `scheduler`.
    pub fn all_ready(&self, srcs: &[PhysReg], scheduler: usize) -> bool {
        srcs.iter().all(|&r| self.is_ready(r, scheduler))
    }

    /// Records `op` as a reader of `reg`.
    pub fn add_consumer(&mut self, reg: PhysReg, op: OpHandle) {
        let list = &mut self.consumers[reg.index()];
        if !list.contains(&op) {
            list.push(op);
        }
    }

    /// Drops `op` from the readers of `reg`.
    pub fn remove_consumer(&mut self, reg: PhysReg, op: OpHandle) {
        self.consumers[reg.index()].retain(|&c| c != op);
    }

    /// Ops that read `reg`, in dispatch order.
    pub fn consumers(&self, reg: PhysReg) -> &[OpHandle] {
        &self.consumers[reg.index()]
    }
}

/// Logical-to-physical register mapping of one thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameMap {
    map: Vec<PhysReg>,
}

impl RenameMap {
    /// Creates a map from an explicit table.
    pub fn new(map: Vec<PhysReg>) -> Self {
        Self { map }
    }

    /// Number of logical registers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Physical register currently holding logical register `reg`.
    pub fn get(&self, reg: u16) -> PhysReg {
        self.map[usize::from(reg)]
    }

    /// Maps logical register `reg` to `phys`, returning the previous mapping.
    pub fn set(&mut self, reg: u16, phys: PhysReg) -> PhysReg {
        std::mem::replace(&mut self.map[usize::from(reg)], phys)
    }

    /// Every mapped physical register.
    pub fn iter(&self) -> impl Iterator<Item = PhysReg> + '_ {
        self.map.iter().copied()
    }
}
