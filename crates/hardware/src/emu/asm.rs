//! Assembler for the reference program format.
//!
//! This module turns assembly text into a `Program`. It provides:
//! 1. **Instructions:** `Inst`, one fixed-width (4-byte) instruction per source line.
//! 2. **Labels:** `name:` definitions usable as branch and jump targets.
//! 3. **Data:** `.quad ADDR, VALUE` and `.word ADDR, VALUE` directives that preload memory.
//!
//! Syntax follows a RISC-style three-operand form. Registers are `r0`..`r31` (`x` is accepted
//! as a prefix) and `r0` always reads as zero. Comments start with `#` or `;`. `call label`
//! links through `r31` and `ret` returns through it.
//!
//! ```text
//!         li   r1, 10
//! loop:   addi r1, r1, -1
//!         sd   r1, 8(r2)
//!         bne  r1, r0, loop
//!         exit r1
//! ```

use std::collections::HashMap;

use crate::common::{SimError, SimResult};

/// Number of architectural registers addressable by the assembly language.
pub const ARCH_REGS: u16 = 32;

/// Scratch register used between the micro-ops of a split instruction.
pub const TEMP_REG: u16 = ARCH_REGS;

/// Default load address of the first instruction.
pub const DEFAULT_BASE: u64 = 0x1000;

/// Bytes per instruction.
pub const INST_BYTES: u64 = 4;

/// Register written by `call` and read by `ret`.
pub const LINK_REG: u16 = 31;

/// Register-register and register-immediate operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Logical left shift.
    Sll,
    /// Logical right shift.
    Srl,
    /// Signed set-less-than.
    Slt,
    /// Multiplication.
    Mul,
    /// Unsigned division. Division by zero yields all ones.
    Div,
}

impl AluOp {
    /// Applies the operation.
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
            Self::Sll => a.wrapping_shl((b & 63) as u32),
            Self::Srl => a.wrapping_shr((b & 63) as u32),
            Self::Slt => u64::from((a as i64) < (b as i64)),
            Self::Mul => a.wrapping_mul(b),
            Self::Div => a.checked_div(b).unwrap_or(u64::MAX),
        }
    }
}

/// Branch conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Signed less-than.
    Lt,
    /// Signed greater-or-equal.
    Ge,
}

impl Cond {
    /// Evaluates the condition.
    pub fn holds(self, a: u64, b: u64) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => (a as i64) < (b as i64),
            Self::Ge => (a as i64) >= (b as i64),
        }
    }
}

/// One assembled instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inst {
    /// `li rd, imm`
    Li { rd: u16, imm: u64 },
    /// `op rd, rs1, rs2`
    Alu { op: AluOp, rd: u16, rs1: u16, rs2: u16 },
    /// `opi rd, rs1, imm`
    AluImm { op: AluOp, rd: u16, rs1: u16, imm: u64 },
    /// `l{b,h,w,d} rd, offset(base)`
    Load { rd: u16, base: u16, offset: u64, size: u8 },
    /// `s{b,h,w,d} src, offset(base)`
    Store { src: u16, base: u16, offset: u64, size: u8 },
    /// `b{eq,ne,lt,ge} rs1, rs2, target`
    Branch { cond: Cond, rs1: u16, rs2: u16, target: u64 },
    /// `j target`
    Jump { target: u64 },
    /// `jr rs`; `ret` is `jr r31`.
    JumpReg { rs: u16 },
    /// `call target`: saves the return address in `r31` and jumps.
    Call { target: u64 },
    /// `ldadd rd, offset(base), rs2`: loads a doubleword and adds `rs2`, as two micro-ops.
    LoadAdd { rd: u16, base: u16, offset: u64, rs2: u16 },
    /// `exit` or `exit rs`
    Exit { rs: Option<u16> },
    /// `alloc addr, size`
    Alloc { addr: u64, size: u64 },
    /// `free addr, size`
    Free { addr: u64, size: u64 },
    /// `read addr, size`: copies the next `size` bytes of the input stream to memory.
    Read { addr: u64, size: u64 },
    /// `write addr, size`: appends `size` bytes of memory to the output stream.
    Write { addr: u64, size: u64 },
    /// `nop`
    Nop,
}

/// An assembled program image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    /// Address of the first instruction.
    pub base: u64,
    /// Instructions, one every `INST_BYTES` bytes from `base`.
    pub insts: Vec<Inst>,
    /// Preloaded memory: `(address, size, value)`.
    pub data: Vec<(u64, u8, u64)>,
    /// Label addresses.
    pub labels: HashMap<String, u64>,
}

impl Program {
    /// Assembles `source` at `DEFAULT_BASE`.
    pub fn assemble(source: &str) -> SimResult<Self> {
        Self::assemble_at(source, DEFAULT_BASE)
    }

    /// Assembles `source` with the first instruction at `base`.
    ///
    /// # Arguments
    ///
    /// * `source` - Assembly text.
    /// * `base` - Address of the first instruction; must be a multiple of `INST_BYTES`.
    ///
    /// # Returns
    ///
    /// The program, or `SimError::Program` naming the first offending line.
    pub fn assemble_at(source: &str, base: u64) -> SimResult<Self> {
        if base % INST_BYTES != 0 {
            return Err(SimError::Program {
                line: 0,
                msg: format!("base address {base:#x} is not instruction aligned"),
            });
        }

        let mut lines = Vec::new();
        let mut labels = HashMap::new();
        let mut pc = base;
        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let mut text = strip_comment(raw).trim();
            while let Some((label, rest)) = split_label(text) {
                if labels.insert(label.to_string(), pc).is_some() {
                    return Err(err(line_no, format!("duplicate label `{label}`")));
                }
                text = rest.trim();
            }
            if text.is_empty() {
                continue;
            }
            let is_directive = text.starts_with('.');
            lines.push((line_no, text));
            if !is_directive {
                pc += INST_BYTES;
            }
        }

        let mut program = Self {
            base,
            labels,
            ..Self::default()
        };
        for (line_no, text) in lines {
            let (mnemonic, rest) = text
                .split_once(char::is_whitespace)
                .map_or((text, ""), |(m, r)| (m, r.trim()));
            let ops = Operands::new(line_no, rest, &program.labels);
            if let Some(size) = data_size(mnemonic) {
                let (addr, value) = ops.two_imms()?;
                program.data.push((addr, size, value));
                continue;
            }
            let inst = parse_inst(&mnemonic.to_ascii_lowercase(), &ops)?;
            program.insts.push(inst);
        }
        Ok(program)
    }

    /// Address one past the last instruction.
    pub fn end(&self) -> u64 {
        self.base + self.insts.len() as u64 * INST_BYTES
    }

    /// Returns the instruction at `pc`, if `pc` is inside the program and aligned.
    pub fn inst_at(&self, pc: u64) -> Option<&Inst> {
        if pc < self.base || (pc - self.base) % INST_BYTES != 0 {
            return None;
        }
        let index = usize::try_from((pc - self.base) / INST_BYTES).ok()?;
        self.insts.get(index)
    }

    /// Address of `label`.
    pub fn label(&self, label: &str) -> Option<u64> {
        self.labels.get(label).copied()
    }
}

fn err(line: usize, msg: impl Into<String>) -> SimError {
    SimError::Program {
        line,
        msg: msg.into(),
    }
}

fn strip_comment(line: &str) -> &str {
    line.find(['#', ';']).map_or(line, |pos| &line[..pos])
}

fn split_label(text: &str) -> Option<(&str, &str)> {
    let (label, rest) = text.split_once(':')?;
    let label = label.trim();
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then_some((label, rest))
}

fn data_size(mnemonic: &str) -> Option<u8> {
    match mnemonic {
        ".byte" => Some(1),
        ".half" => Some(2),
        ".word" => Some(4),
        ".quad" => Some(8),
        _ => None,
    }
}

fn parse_inst(mnemonic: &str, ops: &Operands<'_>) -> SimResult<Inst> {
    let alu = |op| -> SimResult<Inst> {
        let (rd, rs1, rs2) = ops.three_regs()?;
        Ok(Inst::Alu { op, rd, rs1, rs2 })
    };
    let alu_imm = |op| -> SimResult<Inst> {
        let (rd, rs1, imm) = ops.reg_reg_imm()?;
        Ok(Inst::AluImm { op, rd, rs1, imm })
    };
    let load = |size| -> SimResult<Inst> {
        let (rd, offset, base) = ops.reg_mem()?;
        Ok(Inst::Load {
            rd,
            base,
            offset,
            size,
        })
    };
    let store = |size| -> SimResult<Inst> {
        let (src, offset, base) = ops.reg_mem()?;
        Ok(Inst::Store {
            src,
            base,
            offset,
            size,
        })
    };
    let branch = |cond| -> SimResult<Inst> {
        let (rs1, rs2, target) = ops.reg_reg_imm()?;
        Ok(Inst::Branch {
            cond,
            rs1,
            rs2,
            target,
        })
    };

    match mnemonic {
        "nop" => ops.none().map(|()| Inst::Nop),
        "li" => {
            let (rd, imm) = ops.reg_imm()?;
            Ok(Inst::Li { rd, imm })
        }
        "mv" => {
            let (rd, rs1) = ops.two_regs()?;
            Ok(Inst::AluImm {
                op: AluOp::Add,
                rd,
                rs1,
                imm: 0,
            })
        }
        "add" => alu(AluOp::Add),
        "sub" => alu(AluOp::Sub),
        "and" => alu(AluOp::And),
        "or" => alu(AluOp::Or),
        "xor" => alu(AluOp::Xor),
        "sll" => alu(AluOp::Sll),
        "srl" => alu(AluOp::Srl),
        "slt" => alu(AluOp::Slt),
        "mul" => alu(AluOp::Mul),
        "div" => alu(AluOp::Div),
        "addi" => alu_imm(AluOp::Add),
        "andi" => alu_imm(AluOp::And),
        "ori" => alu_imm(AluOp::Or),
        "xori" => alu_imm(AluOp::Xor),
        "slli" => alu_imm(AluOp::Sll),
        "srli" => alu_imm(AluOp::Srl),
        "slti" => alu_imm(AluOp::Slt),
        "lb" => load(1),
        "lh" => load(2),
        "lw" => load(4),
        "ld" => load(8),
        "sb" => store(1),
        "sh" => store(2),
        "sw" => store(4),
        "sd" => store(8),
        "beq" => branch(Cond::Eq),
        "bne" => branch(Cond::Ne),
        "blt" => branch(Cond::Lt),
        "bge" => branch(Cond::Ge),
        "j" => ops.one_imm().map(|target| Inst::Jump { target }),
        "jr" => ops.one_reg().map(|rs| Inst::JumpReg { rs }),
        "call" | "jal" => ops.one_imm().map(|target| Inst::Call { target }),
        "ret" => ops.expect(0).map(|()| Inst::JumpReg { rs: LINK_REG }),
        "ldadd" => ops.ldadd(),
        "exit" | "halt" => {
            if ops.is_empty() {
                Ok(Inst::Exit { rs: None })
            } else {
                ops.one_reg().map(|rs| Inst::Exit { rs: Some(rs) })
            }
        }
        "alloc" => ops.two_imms().map(|(addr, size)| Inst::Alloc { addr, size }),
        "free" => ops.two_imms().map(|(addr, size)| Inst::Free { addr, size }),
        "read" => ops.two_imms().map(|(addr, size)| Inst::Read { addr, size }),
        "write" => ops.two_imms().map(|(addr, size)| Inst::Write { addr, size }),
        other => Err(err(ops.line, format!("unknown mnemonic `{other}`"))),
    }
}

/// Operand list of one source line.
struct Operands<'a> {
    line: usize,
    items: Vec<&'a str>,
    labels: &'a HashMap<String, u64>,
}

impl<'a> Operands<'a> {
    fn new(line: usize, text: &'a str, labels: &'a HashMap<String, u64>) -> Self {
        let items = if text.is_empty() {
            Vec::new()
        } else {
            text.split(',').map(str::trim).collect()
        };
        Self {
            line,
            items,
            labels,
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn expect(&self, n: usize) -> SimResult<()> {
        if self.items.len() == n {
            Ok(())
        } else {
            Err(err(
                self.line,
                format!("expected {n} operands, found {}", self.items.len()),
            ))
        }
    }

    fn reg(&self, i: usize) -> SimResult<u16> {
        let text = self.items[i];
        let digits = text
            .strip_prefix('r')
            .or_else(|| text.strip_prefix('x'))
            .ok_or_else(|| err(self.line, format!("`{text}` is not a register")))?;
        match digits.parse::<u16>() {
            Ok(n) if n < ARCH_REGS => Ok(n),
            _ => Err(err(self.line, format!("`{text}` is not a register"))),
        }
    }

    fn imm(&self, i: usize) -> SimResult<u64> {
        let text = self.items[i];
        parse_number(text)
            .or_else(|| self.labels.get(text).copied())
            .ok_or_else(|| err(self.line, format!("`{text}` is not a number or label")))
    }

    /// Parses `offset(base)`.
    fn mem(&self, i: usize) -> SimResult<(u64, u16)> {
        let text = self.items[i];
        let bad = || err(self.line, format!("`{text}` is not a memory operand"));
        let (offset, rest) = text.split_once('(').ok_or_else(bad)?;
        let base = rest.strip_suffix(')').ok_or_else(bad)?.trim();
        let offset = if offset.trim().is_empty() {
            0
        } else {
            parse_number(offset.trim()).ok_or_else(bad)?
        };
        let base = Operands {
            line: self.line,
            items: vec![base],
            labels: self.labels,
        }
        .reg(0)?;
        Ok((offset, base))
    }

    fn none(&self) -> SimResult<()> {
        self.expect(0)
    }

    fn one_reg(&self) -> SimResult<u16> {
        self.expect(1)?;
        self.reg(0)
    }

    fn one_imm(&self) -> SimResult<u64> {
        self.expect(1)?;
        self.imm(0)
    }

    fn two_regs(&self) -> SimResult<(u16, u16)> {
        self.expect(2)?;
        Ok((self.reg(0)?, self.reg(1)?))
    }

    fn two_imms(&self) -> SimResult<(u64, u64)> {
        self.expect(2)?;
        Ok((self.imm(0)?, self.imm(1)?))
    }

    fn reg_imm(&self) -> SimResult<(u16, u64)> {
        self.expect(2)?;
        Ok((self.reg(0)?, self.imm(1)?))
    }

    fn three_regs(&self) -> SimResult<(u16, u16, u16)> {
        self.expect(3)?;
        Ok((self.reg(0)?, self.reg(1)?, self.reg(2)?))
    }

    fn reg_reg_imm(&self) -> SimResult<(u16, u16, u64)> {
        self.expect(3)?;
        Ok((self.reg(0)?, self.reg(1)?, self.imm(2)?))
    }

    fn reg_mem(&self) -> SimResult<(u16, u64, u16)> {
        self.expect(2)?;
        let (offset, base) = self.mem(1)?;
        Ok((self.reg(0)?, offset, base))
    }

    fn ldadd(&self) -> SimResult<Inst> {
        self.expect(3)?;
        let (offset, base) = self.mem(1)?;
        Ok(Inst::LoadAdd {
            rd: self.reg(0)?,
            base,
            offset,
            rs2: self.reg(2)?,
        })
    }
}

/// Parses a decimal or `0x` hexadecimal literal, optionally negative.
fn parse_number(text: &str) -> Option<u64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let body = body.replace('_', "");
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        body.parse::<u64>().ok()?
    };
    Some(if negative {
        value.wrapping_neg()
    } else {
        value
    })
}
