//! Random straight-line and looping programs: the pipeline must reach the same exit code as
//! functional execution.

use std::fmt::Write as _;

use o3sim_core::ProgramEmulator;
use o3sim_core::config::{BranchPredictor, CheckpointingPolicy, CommitPoint};
use o3sim_core::emu::Emulator;
use o3sim_core::emu::asm::DEFAULT_BASE;
use proptest::prelude::*;

use crate::common::harness::{TestContext, small_core};

const OPS: &[&str] = &["add", "sub", "and", "or", "xor", "sll", "srl", "slt", "mul", "div"];

#[derive(Clone, Debug)]
enum Line {
    Reg { op: usize, rd: u16, rs1: u16, rs2: u16 },
    Imm { rd: u16, rs1: u16, imm: i16 },
    Store { rs: u16, slot: u8 },
    Load { rd: u16, slot: u8 },
}

fn reg() -> impl Strategy<Value = u16> {
    1u16..8
}

fn line() -> impl Strategy<Value = Line> {
    prop_oneof![
        (0..OPS.len(), reg(), reg(), reg())
            .prop_map(|(op, rd, rs1, rs2)| Line::Reg { op, rd, rs1, rs2 }),
        (reg(), reg(), any::<i16>()).prop_map(|(rd, rs1, imm)| Line::Imm { rd, rs1, imm }),
        (reg(), 0u8..4).prop_map(|(rs, slot)| Line::Store { rs, slot }),
        (reg(), 0u8..4).prop_map(|(rd, slot)| Line::Load { rd, slot }),
    ]
}

/// Assembles the body after seeding r1..r7 and pointing r8 at a scratch area. The body
/// optionally runs `loops` times.
fn assemble(seeds: &[u16], body: &[Line], loops: u8, exit_reg: u16) -> String {
    let mut src = String::new();
    for (i, seed) in seeds.iter().enumerate() {
        let _ = writeln!(src, "li r{}, {seed}", i + 1);
    }
    let _ = writeln!(src, "li r8, 0x6000");
    let _ = writeln!(src, "li r9, {loops}");
    let _ = writeln!(src, "top:");
    for line in body {
        let _ = match *line {
            Line::Reg { op, rd, rs1, rs2 } => writeln!(src, "{} r{rd}, r{rs1}, r{rs2}", OPS[op]),
            Line::Imm { rd, rs1, imm } => writeln!(src, "addi r{rd}, r{rs1}, {imm}"),
            Line::Store { rs, slot } => writeln!(src, "sd r{rs}, {}(r8)", slot * 8),
            Line::Load { rd, slot } => writeln!(src, "ld r{rd}, {}(r8)", slot * 8),
        };
    }
    let _ = writeln!(src, "addi r9, r9, -1");
    let _ = writeln!(src, "bne r9, r0, top");
    let _ = writeln!(src, "exit r{exit_reg}");
    src
}

fn functional_result(source: &str, exit_reg: u16) -> u64 {
    let mut emu = ProgramEmulator::from_asm(source).unwrap();
    let _ = emu.skip(0, DEFAULT_BASE, 100_000).unwrap();
    emu.initial_reg_value(0, exit_reg)
}

fn predictor() -> impl Strategy<Value = BranchPredictor> {
    prop_oneof![
        Just(BranchPredictor::StaticNotTaken),
        Just(BranchPredictor::StaticTaken),
        Just(BranchPredictor::GShare),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_pipeline_matches_functional(
        seeds in prop::collection::vec(any::<u16>(), 7),
        body in prop::collection::vec(line(), 1..16),
        loops in 1u8..4,
        exit_reg in reg(),
        predictor in predictor(),
        all_checkpoints in any::<bool>(),
        commit_at_finish in any::<bool>(),
    ) {
        let source = assemble(&seeds, &body, loops, exit_reg);
        let expected = functional_result(&source, exit_reg);

        let (sim, summary) = TestContext::new(&source)
            .with_config(small_core())
            .predictor(predictor)
            .configure(|c| {
                if all_checkpoints {
                    c.pipeline.checkpointing = CheckpointingPolicy::All;
                }
                if commit_at_finish {
                    c.pipeline.commit_point = CommitPoint::Finished;
                }
            })
            .run();

        prop_assert_eq!(summary.exit_codes, vec![Some(expected)], "program:\n{}", source);
        prop_assert!(sim.verify_drained().is_ok());
    }
}
