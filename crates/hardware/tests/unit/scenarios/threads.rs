//! Multiple threads and host notifications.

use mockall::Sequence;
use mockall::predicate::eq;
use o3sim_core::common::Endian;
use o3sim_core::emu::asm::Program;
use o3sim_core::{ProgramEmulator, StopReason};
use pretty_assertions::assert_eq;

use crate::common::harness::{TestContext, small_core};
use crate::common::mocks::system::MockSystem;

const FIRST: &str = "      li   r1, 0
      li   r2, 10
loop: addi r1, r1, 3
      addi r2, r2, -1
      bne  r2, r0, loop
      exit r1
";

const SECOND: &str = "li   r1, 0x5000
li   r2, 11
sd   r2, 0(r1)
ld   r3, 0(r1)
mul  r4, r3, r3
exit r4
";

fn two_processes() -> ProgramEmulator {
    let mut emulator = ProgramEmulator::new(Endian::Little);
    let _ = emulator.add_process(Program::assemble(FIRST).unwrap());
    let _ = emulator.add_process(Program::assemble_at(SECOND, 0x8000).unwrap());
    emulator
}

#[test]
fn test_two_threads_finish_independently() {
    let mut system = MockSystem::new();
    let _ = system
        .expect_notify_process_termination()
        .with(eq(0))
        .times(1)
        .return_const(());
    let _ = system
        .expect_notify_process_termination()
        .with(eq(1))
        .times(1)
        .return_const(());

    let (sim, summary) = TestContext::with_emulator(two_processes())
        .with_config(small_core())
        .with_system(system)
        .run();
    assert_eq!(summary.stop, StopReason::Finished);
    assert_eq!(summary.exit_codes, vec![Some(30), Some(121)]);
    assert_eq!(summary.retired_insts, (2 + 3 * 10 + 1) + 6);

    let threads = sim.core().threads();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[1].pid, 1);
    assert!(threads.iter().all(|t| !t.active && t.inorder.is_empty()));
}

/// Interleaving threads does not change either thread's result.
#[test]
fn test_threads_match_single_runs() {
    let alone = |source: &str| {
        let (_, summary) = TestContext::new(source).with_config(small_core()).run();
        summary.exit_codes[0]
    };
    let (_, together) = TestContext::with_emulator(two_processes())
        .with_config(small_core())
        .run();
    assert_eq!(together.exit_codes, vec![alone(FIRST), alone(SECOND)]);
}

/// Too few physical registers for both threads is caught at construction.
#[test]
fn test_register_budget_counts_threads() {
    let result = TestContext::with_emulator(two_processes())
        .with_config(small_core())
        .configure(|c| c.pipeline.physical_registers = 40)
        .try_build();
    assert!(result.is_err());
}

/// Allocation system calls reach the host in program order, before the exit.
#[test]
fn test_memory_allocation_notifications() {
    let mut seq = Sequence::new();
    let mut system = MockSystem::new();
    let _ = system
        .expect_notify_memory_allocation()
        .with(eq(0x4000), eq(64), eq(true))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let _ = system
        .expect_notify_memory_allocation()
        .with(eq(0x4000), eq(64), eq(false))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let _ = system
        .expect_notify_process_termination()
        .with(eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let source = "alloc 0x4000, 64\nli r1, 5\nfree 0x4000, 64\nexit\n";
    let (_, summary) = TestContext::new(source)
        .with_config(small_core())
        .with_system(system)
        .run();
    assert_eq!(summary.exit_codes, vec![Some(0)]);
    assert_eq!(summary.retired_insts, 4);
}

/// Input lands in memory at commit. The younger load was fetched before that and still sees
/// the new bytes.
#[test]
fn test_stream_system_calls() {
    let source = "read  0x3000, 8
ld    r1, 0x3000(r0)
addi  r1, r1, 1
sd    r1, 0x3008(r0)
write 0x3008, 8
exit  r1
";
    let mut seq = Sequence::new();
    let mut system = MockSystem::new();
    let _ = system
        .expect_notify_syscall_read_file_to_memory()
        .with(eq(0x3000), eq(8))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let _ = system
        .expect_notify_syscall_write_file_from_memory()
        .with(eq(0x3008), eq(8))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let _ = system
        .expect_notify_process_termination()
        .with(eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let mut emulator = ProgramEmulator::from_asm(source).unwrap();
    emulator.set_input(vec![5, 0, 0, 0, 0, 0, 0, 0]);
    let (sim, summary) = TestContext::with_emulator(emulator)
        .with_config(small_core())
        .with_system(system)
        .run();
    assert_eq!(summary.exit_codes, vec![Some(6)]);
    assert_eq!(summary.retired_insts, 6);
    sim.verify_drained().unwrap();
}
