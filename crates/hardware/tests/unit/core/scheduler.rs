//! # Scheduler Tests
//!
//! Wake-up, selection and rescheduling in a single issue queue.

use o3sim_core::config::{Config, RemovePolicy};
use o3sim_core::core::op::{Op, OpArena, OpHandle};
use o3sim_core::core::pipeline::scheduler::{EntryState, Scheduler};
use o3sim_core::core::regs::{PhysReg, RegisterFile};
use o3sim_core::emu::{OpClass, OpInfo};
use pretty_assertions::assert_eq;
use rstest::rstest;

struct Fixture {
    ops: OpArena,
    regs: RegisterFile,
    int: Scheduler,
    mem: Scheduler,
    next_serial: u64,
}

impl Fixture {
    fn new(policy: RemovePolicy) -> Self {
        let config = Config::default();
        Self {
            ops: OpArena::new(32),
            regs: RegisterFile::new(16, 2).unwrap(),
            int: Scheduler::new(0, &config.schedulers[0], policy, 2),
            mem: Scheduler::new(1, &config.schedulers[1], policy, 2),
            next_serial: 0,
        }
    }

    fn op(&mut self, class: OpClass, srcs: &[PhysReg]) -> OpHandle {
        let serial = self.next_serial;
        self.next_serial += 1;
        let pc = 0x1000 + 4 * serial;
        self.ops
            .allocate(|h| {
                let mut op = Op::new(h, 0, 0, pc, OpInfo::new(class, pc + 4));
                op.global_serial = serial;
                op.srcs = srcs.to_vec();
                op
            })
            .unwrap()
    }

    fn dispatch_int(&mut self, class: OpClass, srcs: &[PhysReg]) -> OpHandle {
        let h = self.op(class, srcs);
        self.int.dispatch_end(&self.regs, &self.ops[h]);
        h
    }
}

// ══════════════════════════════════════════════════════════
// 1. Wake-up and selection
// ══════════════════════════════════════════════════════════

/// An op waits until each source is ready for its own scheduler.
#[test]
fn test_wakeup_per_scheduler() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let src = f.regs.allocate().unwrap();
    let h = f.dispatch_int(OpClass::IntAlu, &[src]);
    assert_eq!(f.int.state_of(h), Some(EntryState::NotReady));

    f.regs.set_ready(src, 1);
    assert!(!f.int.wakeup(&f.regs, &f.ops[h]), "ready for the other scheduler only");

    f.regs.set_ready(src, 0);
    assert!(f.int.wakeup(&f.regs, &f.ops[h]));
    assert_eq!(f.int.state_of(h), Some(EntryState::Ready));
}

/// Selection takes the oldest ready ops up to the issue width.
#[test]
fn test_select_oldest_first_within_width() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let ops: Vec<OpHandle> = (0..3).map(|_| f.op(OpClass::IntAlu, &[])).collect();
    for &h in ops.iter().rev() {
        f.int.dispatch_end(&f.regs, &f.ops[h]);
    }
    assert_eq!(f.int.plan_select(&f.ops, 0, false), vec![ops[0], ops[1]]);
}

/// A busy non-pipelined unit blocks selection of its class.
#[test]
fn test_non_pipelined_unit_blocks() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let first = f.dispatch_int(OpClass::IntDiv, &[]);
    assert!(f.int.issue(&f.ops[first], 0));
    let second = f.dispatch_int(OpClass::IntDiv, &[]);
    assert!(f.int.plan_select(&f.ops, 1, false).is_empty());
    let latency = f.int.exec_latency(OpClass::IntDiv);
    assert_eq!(f.int.plan_select(&f.ops, latency, false), vec![second]);
}

/// Memory ops are held back while the cache asks for a stall.
#[test]
fn test_memory_stall() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let load = f.op(OpClass::Load, &[]);
    f.mem.dispatch_end(&f.regs, &f.ops[load]);
    assert!(f.mem.plan_select(&f.ops, 0, true).is_empty());
    assert_eq!(f.mem.plan_select(&f.ops, 0, false), vec![load]);
}

// ══════════════════════════════════════════════════════════
// 2. Remove policy and rescheduling
// ══════════════════════════════════════════════════════════

/// Which issued ops still hold a window slot depends on the remove policy.
#[rstest]
#[case(RemovePolicy::Retain, 1, 1)]
#[case(RemovePolicy::Remove, 0, 0)]
#[case(RemovePolicy::RemoveAfterFinish, 1, 0)]
fn test_remove_policy_window_use(
    #[case] policy: RemovePolicy,
    #[case] after_issue: usize,
    #[case] after_finish: usize,
) {
    let mut f = Fixture::new(policy);
    let h = f.dispatch_int(OpClass::IntAlu, &[]);
    assert!(f.int.issue(&f.ops[h], 0));
    assert_eq!(f.int.len(), after_issue);
    f.int.finished(h);
    assert_eq!(f.int.len(), after_finish);
}

/// Rescheduling a waiting op is a no-op that reports no re-issue.
#[test]
fn test_reschedule_waiting_is_noop() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let src = f.regs.allocate().unwrap();
    let waiting = f.dispatch_int(OpClass::IntAlu, &[src]);
    let ready = f.dispatch_int(OpClass::IntAlu, &[]);
    assert!(!f.int.reschedule(&f.regs, &f.ops[waiting]));
    assert!(!f.int.reschedule(&f.regs, &f.ops[ready]));
    assert_eq!(f.int.state_of(waiting), Some(EntryState::NotReady));
    assert_eq!(f.int.state_of(ready), Some(EntryState::Ready));
    assert_eq!(f.int.len(), 2);
}

/// Rescheduling an issued op returns it to exactly one waiting set.
#[rstest]
#[case(RemovePolicy::Retain)]
#[case(RemovePolicy::Remove)]
#[case(RemovePolicy::RemoveAfterFinish)]
fn test_reschedule_issued(#[case] policy: RemovePolicy) {
    let mut f = Fixture::new(policy);
    let src = f.regs.allocate().unwrap();
    f.regs.set_fully_ready(src);
    let h = f.dispatch_int(OpClass::IntAlu, &[src]);
    assert!(f.int.issue(&f.ops[h], 0));

    f.regs.reset_ready(src);
    assert!(f.int.reschedule(&f.regs, &f.ops[h]));
    assert_eq!(f.int.state_of(h), Some(EntryState::NotReady));
    assert_eq!(f.int.len(), 1, "no orphaned issue slot");

    f.regs.set_ready(src, 0);
    assert!(f.int.wakeup(&f.regs, &f.ops[h]));
    assert_eq!(f.int.plan_select(&f.ops, 5, false), vec![h]);
}

/// A ready op whose source was reset falls back to not-ready.
#[test]
fn test_reschedule_ready_with_reset_source() {
    let mut f = Fixture::new(RemovePolicy::Retain);
    let src = f.regs.allocate().unwrap();
    f.regs.set_fully_ready(src);
    let h = f.dispatch_int(OpClass::IntAlu, &[src]);
    f.regs.reset_ready(src);
    assert!(!f.int.reschedule(&f.regs, &f.ops[h]));
    assert_eq!(f.int.state_of(h), Some(EntryState::NotReady));
}
