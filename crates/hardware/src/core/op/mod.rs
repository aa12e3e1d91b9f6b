//! In-flight instruction instances.
//!
//! An `Op` is one dynamic instance of a micro-op, from fetch until it retires or is
//! flushed. It provides:
//! 1. **Identity:** `OpHandle`, a generation-checked index into the `OpArena`.
//! 2. **Lifecycle:** `OpStatus`, the forward-only status state machine.
//! 3. **State:** `Op`, the fields every pipeline unit reads and writes.
//!
//! Components never hold references to ops. They hold handles and look ops up in the arena,
//! which detects any use of a handle after its op was released.

/// Generation-checked op storage.
pub mod arena;

pub use self::arena::OpArena;

use std::fmt;

use crate::common::MemAccess;
use crate::core::checkpoint::CheckpointId;
use crate::core::regs::PhysReg;
use crate::emu::{Fault, OpInfo};

/// Stable identifier of a live op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpHandle {
    index: u32,
    generation: u32,
}

impl OpHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for OpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}.{}", self.index, self.generation)
    }
}

/// Lifecycle status. Later variants are further along the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpStatus {
    /// Not yet initialized.
    #[default]
    Invalid,
    /// Squashed; terminal.
    Flushed,
    /// Fetched, waiting for rename.
    Fetch,
    /// Renamed, waiting for dispatch.
    Rename,
    /// Being placed into a scheduler.
    Dispatching,
    /// Waiting in a scheduler.
    Dispatched,
    /// Selected, travelling to its execution unit.
    Issuing,
    /// Executing.
    Executing,
    /// Execution finished; the result exists.
    Finished,
    /// Writing its result back.
    WritingBack,
    /// Result written back.
    WrittenBack,
    /// Needs no execution (nop, system call, undefined).
    Nop,
    /// Being committed.
    Committing,
    /// Committed, waiting for retirement.
    Committed,
    /// Retired; its slot is about to be released.
    Retired,
}

impl OpStatus {
    /// True while the op is owned by a scheduler's dispatch window.
    pub fn is_dispatched(self) -> bool {
        (Self::Dispatched..=Self::WrittenBack).contains(&self)
    }

    /// True once the op has started executing (and has not been rescheduled since).
    pub fn has_executed(self) -> bool {
        self >= Self::Executing
    }

    /// True once the result of the op exists.
    pub fn is_finished(self) -> bool {
        self >= Self::Finished
    }

    /// True once commit has begun.
    pub fn is_committed(self) -> bool {
        self >= Self::Committing
    }
}

/// Event generations used to cancel pending events of an op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Epochs {
    /// Bumped when the op is rescheduled or flushed. Cancels every pending event.
    pub event: u32,
    /// Bumped when the op finishes. Cancels pending wake-up events only.
    pub wakeup: u32,
}

/// One in-flight micro-op.
#[derive(Clone, Debug)]
pub struct Op {
    /// This op's handle.
    pub handle: OpHandle,
    /// Hardware thread index.
    pub tid: usize,
    /// Simulated process id.
    pub pid: u32,
    /// Program counter of the instruction.
    pub pc: u64,
    /// Decoded micro-op.
    pub info: OpInfo,
    /// Program-order sequence number within the thread.
    pub serial: u64,
    /// Sequence number across all threads.
    pub global_serial: u64,
    /// Lifecycle status.
    pub status: OpStatus,
    /// Scheduler index, once dispatched.
    pub scheduler: Option<usize>,
    /// Snapshot taken before this op.
    pub before_checkpoint: Option<CheckpointId>,
    /// Snapshot taken after this op.
    pub after_checkpoint: Option<CheckpointId>,
    /// Renamed sources.
    pub srcs: Vec<PhysReg>,
    /// Renamed destinations.
    pub dsts: Vec<PhysReg>,
    /// Previous mappings of the destinations, freed at retirement.
    pub prev_dsts: Vec<PhysReg>,
    /// Value produced for the destination registers, set at execution.
    pub result: Option<u64>,
    /// Memory access of loads and stores, set at execution.
    pub mem: Option<MemAccess>,
    /// Global serial of the store a load forwarded from.
    pub forwarded_from: Option<u64>,
    /// Store this memory op is predicted to depend on, set at rename.
    pub mem_dep: Option<OpHandle>,
    /// Fetch-time successor prediction.
    pub predicted_next_pc: u64,
    /// Predicted direction of a conditional branch.
    pub predicted_taken: Option<bool>,
    /// Global history used for the prediction.
    pub history: u64,
    /// Successor computed at execution.
    pub next_pc: Option<u64>,
    /// Exception raised at execution.
    pub exception: Option<Fault>,
    /// Cycles from issue to finish that dependents were scheduled for.
    pub predicted_latency: u64,
    /// A load was predicted to hit the first cache level.
    pub predicted_hit: bool,
    /// Cycles from execution start to finish.
    pub latency: u64,
    /// Cache latency of a committed store.
    pub store_latency: u64,
    /// Cancellation generations.
    pub epochs: Epochs,
}

impl Op {
    /// Creates a freshly fetched op.
    pub fn new(handle: OpHandle, tid: usize, pid: u32, pc: u64, info: OpInfo) -> Self {
        Self {
            handle,
            tid,
            pid,
            pc,
            predicted_next_pc: info.fallthrough,
            info,
            serial: 0,
            global_serial: 0,
            status: OpStatus::Fetch,
            scheduler: None,
            before_checkpoint: None,
            after_checkpoint: None,
            srcs: Vec::new(),
            dsts: Vec::new(),
            prev_dsts: Vec::new(),
            result: None,
            mem: None,
            forwarded_from: None,
            mem_dep: None,
            predicted_taken: None,
            history: 0,
            next_pc: None,
            exception: None,
            predicted_latency: 0,
            predicted_hit: true,
            latency: 0,
            store_latency: 0,
            epochs: Epochs::default(),
        }
    }

    /// True if a control transfer resolved differently from its prediction.
    pub fn is_mispredicted(&self) -> bool {
        self.next_pc
            .is_some_and(|actual| actual != self.predicted_next_pc)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} t{} #{} pc={:#x}.{} {:?} {:?}",
            self.handle,
            self.tid,
            self.serial,
            self.pc,
            self.info.micro_index,
            self.info.class,
            self.status
        )
    }
}
