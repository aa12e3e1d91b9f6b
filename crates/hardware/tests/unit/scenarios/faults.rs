//! Exceptions and fatal conditions.

use o3sim_core::config::BranchPredictor;
use o3sim_core::emu::asm::{DEFAULT_BASE, INST_BYTES};
use o3sim_core::{ProgramEmulator, SimError, StopReason};
use pretty_assertions::assert_eq;

use crate::common::harness::{TestContext, small_core};
use crate::common::scripted::ScriptedEmulator;

const ARITH: &str = "li   r1, 5
li   r2, 7
add  r3, r1, r2
addi r3, r3, 30
exit r3
";

/// A transient fault on the third instruction is retried from that instruction.
#[test]
fn test_transient_fault_is_refetched() {
    let emulator = ProgramEmulator::from_asm(ARITH).unwrap();
    emulator.inject_fault(0, DEFAULT_BASE + 2 * INST_BYTES, 1);

    let (sim, summary) = TestContext::with_emulator(emulator)
        .with_config(small_core())
        .run();
    assert_eq!(summary.exit_codes, vec![Some(42)]);
    assert_eq!(summary.retired_insts, 5);
    assert_eq!(sim.stats().recovery.exception.count, 1);
}

#[test]
fn test_exception_recovery_latency() {
    let run = |latency| {
        let emulator = ProgramEmulator::from_asm(ARITH).unwrap();
        emulator.inject_fault(0, DEFAULT_BASE + 2 * INST_BYTES, 2);
        let (sim, summary) = TestContext::with_emulator(emulator)
            .with_config(small_core())
            .configure(|c| c.recovery.exception_recovery_latency = latency)
            .run();
        assert_eq!(summary.exit_codes, vec![Some(42)]);
        assert_eq!(sim.stats().recovery.exception.count, 2);
        summary.cycles
    };
    assert!(run(10) > run(0));
}

/// Running off the end of a program reaches an undefined instruction at the head.
#[test]
fn test_undefined_instruction_aborts() {
    let (sim, result) = TestContext::new("li r1, 1\nli r2, 2\n")
        .with_config(small_core())
        .try_run();
    let err = result.unwrap_err();
    assert!(matches!(err, SimError::Aborted { .. }), "{err}");
    assert!(matches!(err.root(), SimError::Unsupported(_)), "{err}");
    assert!(err.to_string().contains("undefined instruction"), "{err}");
    assert_eq!(sim.core().stats().committed_insts, 2);
}

#[test]
fn test_fatal_fault_at_head_aborts() {
    let emulator = ScriptedEmulator::new(vec![
        ScriptedEmulator::alu(0, 1, 3),
        ScriptedEmulator::fatal(1),
        ScriptedEmulator::exit(2),
    ]);
    let (_, result) = TestContext::with_emulator(emulator)
        .with_config(small_core())
        .try_run();
    let err = result.unwrap_err();
    assert!(matches!(err.root(), SimError::Unsupported(_)), "{err}");
    assert!(err.to_string().contains("fatal exception"), "{err}");
}

/// A fatal op fetched down the wrong path is squashed before it can reach the head.
#[test]
fn test_fatal_fault_on_wrong_path_is_squashed() {
    let emulator = ScriptedEmulator::new(vec![
        ScriptedEmulator::taken_branch(0, 3),
        ScriptedEmulator::fatal(1),
        ScriptedEmulator::fatal(2),
        ScriptedEmulator::alu(3, 1, 9),
        ScriptedEmulator::exit(4),
    ]);
    let (sim, summary) = TestContext::with_emulator(emulator)
        .with_config(small_core())
        .predictor(BranchPredictor::StaticNotTaken)
        .run();
    assert_eq!(summary.stop, StopReason::Finished);
    assert_eq!(summary.exit_codes, vec![Some(0)]);
    assert_eq!(summary.retired_insts, 3);
    assert_eq!(sim.stats().recovery.bpred.count, 1);
}

/// Going longer than the no-commit limit without a commit is reported as a deadlock.
#[test]
fn test_no_commit_limit() {
    let source = "li r1, 100\nli r2, 3\ndiv r3, r1, r2\nexit r3\n";
    let (_, result) = TestContext::new(source)
        .with_config(small_core())
        .configure(|c| c.general.no_commit_limit = 3)
        .try_run();
    let err = result.unwrap_err();
    assert!(matches!(err.root(), SimError::Invariant(_)), "{err}");
    assert!(err.to_string().contains("no op committed"), "{err}");

    let (_, summary) = TestContext::new(source).with_config(small_core()).run();
    assert_eq!(summary.exit_codes, vec![Some(33)]);
}
