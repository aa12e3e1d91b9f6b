//! Emulator over assembled programs.
//!
//! `ProgramEmulator` gives the core the instruction semantics of the `asm` language. Each
//! process has its own program and architectural register file; all processes share one
//! memory image. The register file is only used by `skip`: during detailed simulation the
//! core holds register values in its own physical register file and passes them in.
//!
//! The `read` and `write` system calls move bytes between memory and one input and one
//! output stream, also shared by every process.

use std::cell::RefCell;
use std::collections::HashMap;

use super::asm::{ARCH_REGS, INST_BYTES, Inst, LINK_REG, Program, TEMP_REG};
use super::{
    CommitOutcome, Effect, Emulator, Fault, LinkHint, MemImage, OpClass, OpInfo, SparseMemory,
};
use crate::common::{Endian, MemAccess, MemAccessResult, SimError, SimResult};
use crate::sim::system::SystemNotification;

#[derive(Clone, Debug)]
struct Process {
    program: Program,
    regs: Vec<u64>,
    pc: u64,
}

/// Reference `Emulator` implementation.
#[derive(Debug)]
pub struct ProgramEmulator {
    processes: Vec<Process>,
    memory: SparseMemory,
    /// Remaining injected transient faults, keyed by `(pid, pc)`.
    faults: RefCell<HashMap<(u32, u64), u32>>,
    input: Vec<u8>,
    input_pos: usize,
    output: Vec<u8>,
}

/// Largest transfer a single `read` or `write` may request.
const MAX_TRANSFER: u64 = 1 << 20;

impl ProgramEmulator {
    /// Creates an emulator with no processes.
    pub fn new(endian: Endian) -> Self {
        Self {
            processes: Vec::new(),
            memory: SparseMemory::new(endian),
            faults: RefCell::new(HashMap::new()),
            input: Vec::new(),
            input_pos: 0,
            output: Vec::new(),
        }
    }

    /// Assembles `source` into a single-process little-endian emulator.
    pub fn from_asm(source: &str) -> SimResult<Self> {
        let mut emu = Self::new(Endian::Little);
        let _pid = emu.add_process(Program::assemble(source)?);
        Ok(emu)
    }

    /// Adds a process running `program` and preloads its data. Returns the new pid.
    pub fn add_process(&mut self, program: Program) -> u32 {
        for &(addr, size, value) in &program.data {
            let mut access = MemAccess::with_value(addr, size, value);
            self.memory.write(&mut access);
        }
        let pc = program.base;
        self.processes.push(Process {
            program,
            regs: vec![0; usize::from(ARCH_REGS) + 1],
            pc,
        });
        (self.processes.len() - 1) as u32
    }

    /// Sets the initial value of an architectural register.
    pub fn set_reg(&mut self, pid: u32, reg: u16, value: u64) {
        if reg == 0 {
            return;
        }
        if let Some(slot) = self
            .processes
            .get_mut(pid as usize)
            .and_then(|p| p.regs.get_mut(usize::from(reg)))
        {
            *slot = value;
        }
    }

    /// Makes the next `times` executions of the instruction at `pc` raise a transient fault.
    pub fn inject_fault(&self, pid: u32, pc: u64, times: u32) {
        let _prev = self.faults.borrow_mut().insert((pid, pc), times);
    }

    /// Program of `pid`.
    pub fn program(&self, pid: u32) -> Option<&Program> {
        self.processes.get(pid as usize).map(|p| &p.program)
    }

    /// Shared memory image.
    pub fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    /// Replaces the input stream consumed by `read`. Reads past its end see zeros.
    pub fn set_input(&mut self, bytes: impl Into<Vec<u8>>) {
        self.input = bytes.into();
        self.input_pos = 0;
    }

    /// Bytes written by `write` so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Copies the next `size` input bytes to memory at `addr`.
    fn read_input(&mut self, addr: u64, size: u64) -> SimResult<()> {
        check_transfer(addr, size)?;
        for offset in 0..size {
            let byte = self.input.get(self.input_pos).copied().unwrap_or(0);
            self.input_pos = self.input_pos.saturating_add(1);
            let mut access = MemAccess::with_value(addr + offset, 1, u64::from(byte));
            self.memory.write(&mut access);
            if access.result != MemAccessResult::Success {
                return Err(SimError::Unsupported(format!(
                    "read into {:#x} failed: {:?}",
                    access.address, access.result
                )));
            }
        }
        Ok(())
    }

    /// Appends `size` bytes of memory at `addr` to the output stream.
    fn write_output(&mut self, addr: u64, size: u64) -> SimResult<()> {
        check_transfer(addr, size)?;
        for offset in 0..size {
            let mut access = MemAccess::new(addr + offset, 1);
            self.memory.read(&mut access);
            if access.result != MemAccessResult::Success {
                return Err(SimError::Unsupported(format!(
                    "write from {:#x} failed: {:?}",
                    access.address, access.result
                )));
            }
            self.output.push(access.value as u8);
        }
        Ok(())
    }

    fn inst(&self, pid: u32, pc: u64) -> Option<Inst> {
        self.processes
            .get(pid as usize)
            .and_then(|p| p.program.inst_at(pc))
            .copied()
    }

    fn take_fault(&self, pid: u32, pc: u64) -> bool {
        let mut faults = self.faults.borrow_mut();
        match faults.get_mut(&(pid, pc)) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

fn check_transfer(addr: u64, size: u64) -> SimResult<()> {
    if size > MAX_TRANSFER || addr.checked_add(size).is_none() {
        return Err(SimError::Unsupported(format!(
            "transfer of {size} bytes at {addr:#x} is out of range"
        )));
    }
    Ok(())
}

fn reg_list(regs: &[u16]) -> Vec<u16> {
    regs.to_vec()
}

fn dst_list(rd: u16) -> Vec<u16> {
    if rd == 0 { Vec::new() } else { vec![rd] }
}

fn decode_inst(inst: Inst, pc: u64) -> Vec<OpInfo> {
    let fallthrough = pc + INST_BYTES;
    let mut info = OpInfo::new(OpClass::Nop, fallthrough);
    match inst {
        Inst::Li { rd, .. } => {
            info.class = OpClass::IntAlu;
            info.dsts = dst_list(rd);
        }
        Inst::Alu { op, rd, rs1, rs2 } => {
            info.class = match op {
                super::asm::AluOp::Mul => OpClass::IntMul,
                super::asm::AluOp::Div => OpClass::IntDiv,
                _ => OpClass::IntAlu,
            };
            info.srcs = reg_list(&[rs1, rs2]);
            info.dsts = dst_list(rd);
        }
        Inst::AluImm { rd, rs1, .. } => {
            info.class = OpClass::IntAlu;
            info.srcs = reg_list(&[rs1]);
            info.dsts = dst_list(rd);
        }
        Inst::Load { rd, base, size, .. } => {
            info.class = OpClass::Load;
            info.srcs = reg_list(&[base]);
            info.dsts = dst_list(rd);
            info.mem_size = size;
        }
        Inst::Store {
            src, base, size, ..
        } => {
            info.class = OpClass::Store;
            info.srcs = reg_list(&[base, src]);
            info.mem_size = size;
        }
        Inst::Branch {
            rs1, rs2, target, ..
        } => {
            info.class = OpClass::Branch;
            info.srcs = reg_list(&[rs1, rs2]);
            info.target = Some(target);
        }
        Inst::Jump { target } => {
            info.class = OpClass::Jump;
            info.target = Some(target);
        }
        Inst::JumpReg { rs } => {
            info.class = OpClass::Jump;
            info.srcs = reg_list(&[rs]);
            if rs == LINK_REG {
                info.link = LinkHint::Return;
            }
        }
        Inst::Call { target } => {
            info.class = OpClass::Jump;
            info.target = Some(target);
            info.dsts = vec![LINK_REG];
            info.link = LinkHint::Call;
        }
        Inst::LoadAdd { rd, base, rs2, .. } => {
            let mut load = OpInfo::new(OpClass::Load, fallthrough);
            load.micro_count = 2;
            load.srcs = vec![base];
            load.dsts = vec![TEMP_REG];
            load.mem_size = 8;
            let mut add = OpInfo::new(OpClass::IntAlu, fallthrough);
            add.micro_index = 1;
            add.micro_count = 2;
            add.srcs = vec![TEMP_REG, rs2];
            add.dsts = dst_list(rd);
            return vec![load, add];
        }
        Inst::Exit { rs } => {
            info.class = OpClass::Syscall;
            info.srcs = rs.map(|r| vec![r]).unwrap_or_default();
        }
        Inst::Alloc { .. } | Inst::Free { .. } | Inst::Read { .. } | Inst::Write { .. } => {
            info.class = OpClass::Syscall;
        }
        Inst::Nop => {}
    }
    vec![info]
}

/// Computes the effect of micro-op `micro` of `inst` from its source values.
fn execute_inst(inst: Inst, micro: u8, pc: u64, srcs: &[u64]) -> Effect {
    let src = |i: usize| srcs.get(i).copied().unwrap_or(0);
    let fallthrough = pc + INST_BYTES;
    let mut effect = Effect::default();
    match inst {
        Inst::Li { imm, .. } => effect.dst = Some(imm),
        Inst::Alu { op, .. } => effect.dst = Some(op.apply(src(0), src(1))),
        Inst::AluImm { op, imm, .. } => effect.dst = Some(op.apply(src(0), imm)),
        Inst::Load { offset, size, .. } => {
            effect.mem = Some(MemAccess::new(src(0).wrapping_add(offset), size));
        }
        Inst::Store { offset, size, .. } => {
            let value = src(1) & crate::common::access::size_mask(size);
            effect.mem = Some(MemAccess::with_value(
                src(0).wrapping_add(offset),
                size,
                value,
            ));
        }
        Inst::Branch { cond, target, .. } => {
            effect.next_pc = Some(if cond.holds(src(0), src(1)) {
                target
            } else {
                fallthrough
            });
        }
        Inst::Jump { target } => effect.next_pc = Some(target),
        Inst::JumpReg { .. } => effect.next_pc = Some(src(0)),
        Inst::Call { target } => {
            effect.dst = Some(fallthrough);
            effect.next_pc = Some(target);
        }
        Inst::LoadAdd { offset, .. } => {
            if micro == 0 {
                effect.mem = Some(MemAccess::new(src(0).wrapping_add(offset), 8));
            } else {
                effect.dst = Some(src(0).wrapping_add(src(1)));
            }
        }
        Inst::Exit { .. }
        | Inst::Alloc { .. }
        | Inst::Free { .. }
        | Inst::Read { .. }
        | Inst::Write { .. }
        | Inst::Nop => {}
    }
    effect
}

impl Emulator for ProgramEmulator {
    fn process_count(&self) -> usize {
        self.processes.len()
    }

    fn register_count(&self) -> usize {
        usize::from(ARCH_REGS) + 1
    }

    fn entry_pc(&self, pid: u32) -> u64 {
        self.processes.get(pid as usize).map_or(0, |p| p.pc)
    }

    fn decode(&self, pid: u32, pc: u64) -> Vec<OpInfo> {
        match self.inst(pid, pc) {
            Some(inst) => decode_inst(inst, pc),
            None => vec![OpInfo::new(OpClass::Undefined, pc + INST_BYTES)],
        }
    }

    fn initial_reg_value(&self, pid: u32, reg: u16) -> u64 {
        self.processes
            .get(pid as usize)
            .and_then(|p| p.regs.get(usize::from(reg)))
            .copied()
            .unwrap_or(0)
    }

    fn execute(&self, pid: u32, pc: u64, info: &OpInfo, srcs: &[u64]) -> Effect {
        let Some(inst) = self.inst(pid, pc) else {
            return Effect {
                fault: Some(Fault::Fatal),
                ..Effect::default()
            };
        };
        let mut effect = execute_inst(inst, info.micro_index, pc, srcs);
        if info.micro_index == 0 && self.take_fault(pid, pc) {
            effect.fault = Some(Fault::Transient);
        }
        effect
    }

    fn skip(&mut self, pid: u32, pc: u64, count: u64) -> SimResult<(u64, u64)> {
        let mut pc = pc;
        let mut executed = 0;
        while executed < count {
            let inst = self
                .inst(pid, pc)
                .ok_or_else(|| SimError::Unsupported(format!("skip reached undefined pc {pc:#x}")))?;
            if matches!(inst, Inst::Exit { .. }) {
                break;
            }
            let infos = decode_inst(inst, pc);
            let mut next = pc + INST_BYTES;
            for info in &infos {
                let process = &self.processes[pid as usize];
                let srcs: Vec<u64> = info
                    .srcs
                    .iter()
                    .map(|&r| process.regs[usize::from(r)])
                    .collect();
                let effect = execute_inst(inst, info.micro_index, pc, &srcs);
                let mut value = effect.dst;
                if let Some(mut access) = effect.mem {
                    if info.class.is_store() {
                        self.memory.write(&mut access);
                    } else {
                        self.memory.read(&mut access);
                        value = Some(access.value);
                    }
                    if access.result != MemAccessResult::Success {
                        return Err(SimError::Unsupported(format!(
                            "access violation at {:#x} while skipping",
                            access.address
                        )));
                    }
                }
                if let Some(target) = effect.next_pc {
                    next = target;
                }
                if let (Some(&rd), Some(value)) = (info.dsts.first(), value) {
                    self.processes[pid as usize].regs[usize::from(rd)] = value;
                }
            }
            match inst {
                Inst::Read { addr, size } => self.read_input(addr, size)?,
                Inst::Write { addr, size } => self.write_output(addr, size)?,
                _ => {}
            }
            pc = next;
            executed += 1;
        }
        if let Some(process) = self.processes.get_mut(pid as usize) {
            process.pc = pc;
        }
        Ok((pc, executed))
    }

    fn commit_syscall(
        &mut self,
        pid: u32,
        pc: u64,
        _info: &OpInfo,
        srcs: &[u64],
    ) -> SimResult<CommitOutcome> {
        match self.inst(pid, pc) {
            Some(Inst::Exit { .. }) => Ok(CommitOutcome::Exit(srcs.first().copied().unwrap_or(0))),
            Some(Inst::Alloc { addr, size }) => Ok(CommitOutcome::Notify(
                SystemNotification::MemoryAllocation {
                    addr,
                    size,
                    allocate: true,
                },
            )),
            Some(Inst::Free { addr, size }) => Ok(CommitOutcome::Notify(
                SystemNotification::MemoryAllocation {
                    addr,
                    size,
                    allocate: false,
                },
            )),
            Some(Inst::Read { addr, size }) => {
                self.read_input(addr, size)?;
                Ok(CommitOutcome::Notify(SystemNotification::ReadFileToMemory {
                    addr,
                    size,
                }))
            }
            Some(Inst::Write { addr, size }) => {
                self.write_output(addr, size)?;
                Ok(CommitOutcome::Notify(SystemNotification::WriteFileFromMemory {
                    addr,
                    size,
                }))
            }
            _ => Err(SimError::Unsupported(format!(
                "no system call at pc {pc:#x} (pid {pid})"
            ))),
        }
    }

    fn mem_image(&self) -> &dyn MemImage {
        &self.memory
    }

    fn mem_image_mut(&mut self) -> &mut dyn MemImage {
        &mut self.memory
    }
}
