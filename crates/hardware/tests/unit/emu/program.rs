//! # Reference Emulator Tests
//!
//! Functional behavior of assembled programs, checked through fast-forwarding.

use o3sim_core::common::MemAccess;
use o3sim_core::emu::asm::{DEFAULT_BASE, Program};
use o3sim_core::emu::{Emulator, MemImage, OpClass};
use o3sim_core::{ProgramEmulator, SimError};
use pretty_assertions::assert_eq;
use rstest::rstest;

/// Runs `source` functionally up to its exit and returns the value of `reg`.
fn run_to_exit(source: &str, reg: u16) -> u64 {
    let mut emu = ProgramEmulator::from_asm(source).unwrap();
    let _ = emu.skip(0, DEFAULT_BASE, 10_000).unwrap();
    emu.initial_reg_value(0, reg)
}

/// Register-register operations compute the documented results.
#[rstest]
#[case("add", 7, 5, 12)]
#[case("sub", 5, 7, 5u64.wrapping_sub(7))]
#[case("and", 0b1100, 0b1010, 0b1000)]
#[case("or", 0b1100, 0b1010, 0b1110)]
#[case("xor", 0b1100, 0b1010, 0b0110)]
#[case("sll", 1, 65, 2)]
#[case("srl", 0x80, 3, 0x10)]
#[case("slt", u64::MAX, 0, 1)]
#[case("mul", 6, 7, 42)]
#[case("div", 42, 5, 8)]
#[case("div", 42, 0, u64::MAX)]
fn test_alu_ops(#[case] op: &str, #[case] a: u64, #[case] b: u64, #[case] expected: u64) {
    let source = format!("li r1, {a:#x}\nli r2, {b:#x}\n{op} r3, r1, r2\nexit r3\n");
    assert_eq!(run_to_exit(&source, 3), expected, "{op} {a:#x}, {b:#x}");
}

/// A countdown loop runs to completion and leaves the loop counter at zero.
#[test]
fn test_loop() {
    let source = "li r1, 5\n\
                  li r2, 0\n\
                  loop: addi r2, r2, 3\n\
                  addi r1, r1, -1\n\
                  bne r1, r0, loop\n\
                  exit r2\n";
    assert_eq!(run_to_exit(source, 2), 15);
    assert_eq!(run_to_exit(source, 1), 0);
}

/// Sub-word stores and loads respect their width.
#[rstest]
#[case("sb", "lb", 0xFF)]
#[case("sh", "lh", 0xFFFF)]
#[case("sw", "lw", 0xFFFF_FFFF)]
#[case("sd", "ld", u64::MAX)]
fn test_store_load_widths(#[case] store: &str, #[case] load: &str, #[case] expected: u64) {
    let source = format!(
        "li r1, -1\n\
         li r2, 0x3000\n\
         sd r0, 0(r2)\n\
         {store} r1, 0(r2)\n\
         {load} r3, 0(r2)\n\
         exit r3\n"
    );
    assert_eq!(run_to_exit(&source, 3), expected);
}

/// The demo program sums its data table.
#[test]
fn test_demo_sum() {
    let source = include_str!("../../../../../demos/sum.s");
    assert_eq!(run_to_exit(source, 4), 36);
}

/// Data directives preload the shared memory image.
#[test]
fn test_data_preload() {
    let emu = ProgramEmulator::from_asm(".quad 0x2000, 0x1122334455667788\n.word 0x2010, 9\nnop\n")
        .unwrap();
    let mut access = MemAccess::new(0x2000, 8);
    emu.mem_image().read(&mut access);
    assert_eq!(access.value, 0x1122_3344_5566_7788);
    let mut access = MemAccess::new(0x2010, 4);
    emu.mem_image().read(&mut access);
    assert_eq!(access.value, 9);
}

/// Processes are laid out at their own base and share memory.
#[test]
fn test_second_process() {
    let mut emu = ProgramEmulator::from_asm("li r1, 0x4000\nli r2, 11\nsd r2, 0(r1)\nexit\n").unwrap();
    let pid = emu.add_process(Program::assemble_at("li r1, 0x4000\nld r3, 0(r1)\nexit r3\n", 0x8000).unwrap());
    assert_eq!(pid, 1);
    assert_eq!(emu.entry_pc(1), 0x8000);
    assert_eq!(emu.decode(1, 0x8004)[0].class, OpClass::Load);
    let _ = emu.skip(0, DEFAULT_BASE, 100).unwrap();
    let _ = emu.skip(1, 0x8000, 100).unwrap();
    assert_eq!(emu.initial_reg_value(1, 3), 11);
}

/// Fast-forwarding into undecodable memory is an error.
#[test]
fn test_skip_past_end() {
    let mut emu = ProgramEmulator::from_asm("nop\n").unwrap();
    let err = emu.skip(0, DEFAULT_BASE, 10).unwrap_err();
    assert!(matches!(err, SimError::Unsupported(_)), "got {err:?}");
}

/// Undefined labels are reported with their line.
#[test]
fn test_unknown_label() {
    let err = ProgramEmulator::from_asm("nop\nj nowhere\n").unwrap_err();
    assert!(matches!(err, SimError::Program { line: 2, .. }), "got {err:?}");
}
