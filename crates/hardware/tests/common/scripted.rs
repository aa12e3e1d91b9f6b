use o3sim_core::common::{Endian, SimResult};
use o3sim_core::emu::{
    CommitOutcome, Effect, Emulator, Fault, MemImage, OpClass, OpInfo, SparseMemory,
};

/// Base address of the first scripted instruction.
pub const BASE: u64 = 0x1000;

/// One scripted single-micro-op instruction.
#[derive(Clone, Debug)]
pub struct ScriptedOp {
    pub info: OpInfo,
    pub effect: Effect,
}

/// Emulator that decodes a fixed list of instructions laid out four bytes apart from `BASE`
/// and returns a fixed effect for each, whatever the operand values.
#[derive(Debug)]
pub struct ScriptedEmulator {
    ops: Vec<ScriptedOp>,
    memory: SparseMemory,
}

impl ScriptedEmulator {
    pub fn new(ops: Vec<ScriptedOp>) -> Self {
        Self {
            ops,
            memory: SparseMemory::new(Endian::Little),
        }
    }

    pub fn pc(index: usize) -> u64 {
        BASE + 4 * index as u64
    }

    fn info(class: OpClass, index: usize) -> OpInfo {
        OpInfo::new(class, Self::pc(index + 1))
    }

    /// An integer op writing `value` to `dst`.
    pub fn alu(index: usize, dst: u16, value: u64) -> ScriptedOp {
        let mut info = Self::info(OpClass::IntAlu, index);
        info.dsts = vec![dst];
        ScriptedOp {
            info,
            effect: Effect {
                dst: Some(value),
                ..Effect::default()
            },
        }
    }

    /// An integer op whose execution raises a fatal fault.
    pub fn fatal(index: usize) -> ScriptedOp {
        ScriptedOp {
            info: Self::info(OpClass::IntAlu, index),
            effect: Effect {
                fault: Some(Fault::Fatal),
                ..Effect::default()
            },
        }
    }

    /// A conditional branch to instruction `target` that resolves taken.
    pub fn taken_branch(index: usize, target: usize) -> ScriptedOp {
        let mut info = Self::info(OpClass::Branch, index);
        info.target = Some(Self::pc(target));
        ScriptedOp {
            info,
            effect: Effect {
                next_pc: Some(Self::pc(target)),
                ..Effect::default()
            },
        }
    }

    /// An exit system call.
    pub fn exit(index: usize) -> ScriptedOp {
        ScriptedOp {
            info: Self::info(OpClass::Syscall, index),
            effect: Effect::default(),
        }
    }

    fn lookup(&self, pc: u64) -> Option<&ScriptedOp> {
        let offset = pc.checked_sub(BASE)?;
        if offset % 4 != 0 {
            return None;
        }
        self.ops.get((offset / 4) as usize)
    }
}

impl Emulator for ScriptedEmulator {
    fn process_count(&self) -> usize {
        1
    }

    fn register_count(&self) -> usize {
        8
    }

    fn entry_pc(&self, _pid: u32) -> u64 {
        BASE
    }

    fn decode(&self, _pid: u32, pc: u64) -> Vec<OpInfo> {
        match self.lookup(pc) {
            Some(op) => vec![op.info.clone()],
            None => vec![OpInfo::new(OpClass::Undefined, pc + 4)],
        }
    }

    fn initial_reg_value(&self, _pid: u32, _reg: u16) -> u64 {
        0
    }

    fn execute(&self, _pid: u32, pc: u64, _info: &OpInfo, _srcs: &[u64]) -> Effect {
        self.lookup(pc).map(|op| op.effect).unwrap_or_default()
    }

    fn skip(&mut self, _pid: u32, pc: u64, _count: u64) -> SimResult<(u64, u64)> {
        Ok((pc, 0))
    }

    fn commit_syscall(
        &mut self,
        _pid: u32,
        _pc: u64,
        _info: &OpInfo,
        srcs: &[u64],
    ) -> SimResult<CommitOutcome> {
        Ok(CommitOutcome::Exit(srcs.first().copied().unwrap_or(0)))
    }

    fn mem_image(&self) -> &dyn MemImage {
        &self.memory
    }

    fn mem_image_mut(&mut self) -> &mut dyn MemImage {
        &mut self.memory
    }
}
