//! Instruction-semantics collaborator.
//!
//! The core never interprets instructions itself. It asks an `Emulator` to decode a program
//! counter into micro-ops, to compute the effect of a micro-op from its source values, and to
//! apply committed system calls. It provides:
//! 1. **Op metadata:** `OpClass` and `OpInfo`, the decoded form the pipeline schedules.
//! 2. **Effects:** `Effect`, the result of executing a micro-op speculatively.
//! 3. **Contract:** The `Emulator` trait.
//! 4. **Reference implementation:** `ProgramEmulator`, driven by a small assembly language.

/// Assembly-language front end for `ProgramEmulator`.
pub mod asm;

/// Memory image trait and a sparse implementation.
pub mod memory;

/// Emulator over an assembled program.
pub mod program;

pub use memory::{MemImage, SparseMemory};
pub use program::ProgramEmulator;

use serde::Deserialize;

use crate::common::{MemAccess, SimResult};
use crate::sim::system::SystemNotification;

/// Scheduling class of a micro-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OpClass {
    /// Single-cycle integer arithmetic and logic.
    IntAlu,
    /// Integer multiply.
    IntMul,
    /// Integer divide.
    IntDiv,
    /// Memory read.
    Load,
    /// Memory write.
    Store,
    /// Conditional branch.
    Branch,
    /// Unconditional jump, direct or indirect.
    Jump,
    /// System call, applied at commit.
    Syscall,
    /// No operation.
    Nop,
    /// Undecodable instruction. Faults if it ever reaches commit.
    Undefined,
}

impl OpClass {
    /// Returns true for loads.
    pub const fn is_load(self) -> bool {
        matches!(self, Self::Load)
    }

    /// Returns true for stores.
    pub const fn is_store(self) -> bool {
        matches!(self, Self::Store)
    }

    /// Returns true for loads and stores.
    pub const fn is_mem(self) -> bool {
        matches!(self, Self::Load | Self::Store)
    }

    /// Returns true for any control transfer.
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Branch | Self::Jump)
    }

    /// Returns true for system calls.
    pub const fn is_syscall(self) -> bool {
        matches!(self, Self::Syscall)
    }

    /// Returns true for ops that bypass the schedulers.
    ///
    /// Undefined ops bypass them too, so a wrong-path op never occupies a window slot. It
    /// faults only if it reaches commit.
    pub const fn skips_execution(self) -> bool {
        matches!(self, Self::Nop | Self::Syscall | Self::Undefined)
    }

    /// Short lowercase name used in statistics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IntAlu => "int_alu",
            Self::IntMul => "int_mul",
            Self::IntDiv => "int_div",
            Self::Load => "load",
            Self::Store => "store",
            Self::Branch => "branch",
            Self::Jump => "jump",
            Self::Syscall => "syscall",
            Self::Nop => "nop",
            Self::Undefined => "undefined",
        }
    }
}

/// Return-address role of a jump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkHint {
    /// Neither a call nor a return.
    #[default]
    None,
    /// Saves the fall-through address and jumps to a subroutine.
    Call,
    /// Jumps back to the address saved by the matching call.
    Return,
}

/// Decoded micro-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpInfo {
    /// Scheduling class.
    pub class: OpClass,
    /// Position of this micro-op within its instruction.
    pub micro_index: u8,
    /// Number of micro-ops the instruction splits into.
    pub micro_count: u8,
    /// Logical source registers.
    pub srcs: Vec<u16>,
    /// Logical destination registers.
    pub dsts: Vec<u16>,
    /// Access size for loads and stores.
    pub mem_size: u8,
    /// Statically known control-transfer target.
    pub target: Option<u64>,
    /// Address of the next instruction in sequence.
    pub fallthrough: u64,
    /// Call/return role, for return address prediction.
    pub link: LinkHint,
}

impl OpInfo {
    /// Creates a single micro-op instruction of `class` with no operands.
    pub fn new(class: OpClass, fallthrough: u64) -> Self {
        Self {
            class,
            micro_index: 0,
            micro_count: 1,
            srcs: Vec::new(),
            dsts: Vec::new(),
            mem_size: 0,
            target: None,
            fallthrough,
            link: LinkHint::None,
        }
    }

    /// Returns true if this is the last micro-op of its instruction.
    pub const fn is_last_micro_op(&self) -> bool {
        self.micro_index + 1 >= self.micro_count
    }
}

/// Exception raised while executing a micro-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Resolved by refetching the causing instruction.
    Transient,
    /// Cannot be modeled; fatal if the op commits.
    Fatal,
}

/// Result of executing one micro-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Effect {
    /// Value for the destination register. Loads take their value from memory instead.
    pub dst: Option<u64>,
    /// Memory access for loads and stores. Stores carry the value to write.
    pub mem: Option<MemAccess>,
    /// Resolved next program counter for control transfers.
    pub next_pc: Option<u64>,
    /// Exception raised by the op.
    pub fault: Option<Fault>,
}

/// What committing a system call asks the core to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing beyond normal commit.
    Continue,
    /// The process exits with this code.
    Exit(u64),
    /// Forward a notification to the hosting system.
    Notify(SystemNotification),
}

/// Instruction-semantics provider.
pub trait Emulator {
    /// Number of simulated processes; the core runs one hardware thread per process.
    fn process_count(&self) -> usize;

    /// Number of logical registers the decoder may name.
    fn register_count(&self) -> usize;

    /// Program counter at which `pid` starts.
    fn entry_pc(&self, pid: u32) -> u64;

    /// Decodes the instruction at `pc` into one or more micro-ops.
    ///
    /// Undecodable addresses yield a single `OpClass::Undefined` op.
    fn decode(&self, pid: u32, pc: u64) -> Vec<OpInfo>;

    /// Architectural value of logical register `reg` when detailed simulation starts.
    fn initial_reg_value(&self, pid: u32, reg: u16) -> u64;

    /// Computes the effect of a micro-op from its source operand values.
    fn execute(&self, pid: u32, pc: u64, info: &OpInfo, srcs: &[u64]) -> Effect;

    /// Functionally executes up to `count` instructions from `pc`.
    ///
    /// # Returns
    ///
    /// The next program counter and the number of instructions executed.
    fn skip(&mut self, pid: u32, pc: u64, count: u64) -> SimResult<(u64, u64)>;

    /// Applies a committed system call.
    fn commit_syscall(&mut self, pid: u32, pc: u64, info: &OpInfo, srcs: &[u64])
    -> SimResult<CommitOutcome>;

    /// Memory image shared by all processes.
    fn mem_image(&self) -> &dyn MemImage;

    /// Mutable memory image.
    fn mem_image_mut(&mut self) -> &mut dyn MemImage;
}
