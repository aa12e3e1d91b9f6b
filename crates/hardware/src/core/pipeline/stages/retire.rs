//! Commit Stage.
//!
//! The retirer commits whole instructions in program order, round-robin over the threads
//! and bounded by the commit width. It provides:
//! 1. **Commit:** An instruction commits once every micro-op reached the commit point.
//! 2. **Exceptions:** A transient fault at the head refetches the faulting instruction. A
//!    fatal fault or an undefined instruction at the head ends the run.
//! 3. **Deadlock detection:** No commit for `no_commit_limit` cycles with ops in flight is
//!    reported as a broken invariant.

use crate::common::{SimError, SimResult};
use crate::config::CommitPoint;
use crate::core::Core;
use crate::core::op::{Op, OpHandle, OpStatus};
use crate::emu::{Fault, OpClass};
use crate::sim::clock::{Clocked, Priority, Update};

/// Work planned for one thread at the head of its in-order list.
#[derive(Clone, Debug)]
enum CommitAction {
    /// Commit every micro-op of one instruction.
    Commit(Vec<OpHandle>),
    /// Refetch from the faulting op.
    Exception(OpHandle),
    /// The head can never commit.
    Fault(OpHandle),
}

/// The retirer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Retirer;

impl Clocked<Core> for Retirer {
    fn name(&self) -> &'static str {
        "retire"
    }

    fn priority(&self) -> Priority {
        Priority::Commit
    }

    fn evaluate(&self, core: &Core) -> Option<Update<Core>> {
        if let Some(err) = check_deadlock(core) {
            return Some(Box::new(move |_: &mut Core| Err(err)));
        }
        let plan = plan_commit(core);
        if plan.is_empty() {
            return None;
        }
        Some(Box::new(move |core: &mut Core| core.apply_commit(plan)))
    }
}

fn check_deadlock(core: &Core) -> Option<SimError> {
    let limit = core.config().general.no_commit_limit;
    let idle = core.cycle().saturating_sub(core.last_commit_cycle);
    let in_flight: usize = core.threads.iter().map(|t| t.inorder.in_flight_len()).sum();
    (idle > limit && in_flight > 0).then(|| {
        SimError::invariant(format!(
            "no op committed for {idle} cycles with {in_flight} ops in flight"
        ))
    })
}

/// Status an op must reach before it may commit.
fn is_committable(core: &Core, op: &Op) -> bool {
    let point = match core.config().pipeline.commit_point {
        CommitPoint::Finished => OpStatus::Finished,
        CommitPoint::WrittenBack => OpStatus::WrittenBack,
    };
    op.status >= point && op.status < OpStatus::Committing
}

/// Micro-ops of the instruction starting at in-flight position `start`, or `None` if the
/// instruction was not fetched completely yet.
fn instruction_at(core: &Core, tid: usize, start: usize) -> Option<Vec<OpHandle>> {
    let inorder = &core.threads[tid].inorder;
    let mut group = Vec::new();
    let mut i = start;
    loop {
        let h = inorder.get(i)?;
        group.push(h);
        if core.ops[h].info.is_last_micro_op() {
            return Some(group);
        }
        i += 1;
    }
}

fn plan_commit(core: &Core) -> Vec<(usize, CommitAction)> {
    let n = core.threads.len();
    let mut budget = core.config().pipeline.commit_width;
    let mut plan = Vec::new();

    for i in 0..n {
        let tid = (core.commit_thread + i) % n;
        let mut pos = 0;
        while budget > 0 {
            let Some(group) = instruction_at(core, tid, pos) else {
                break;
            };
            if group.len() > budget && pos > 0 {
                break;
            }
            if !group.iter().all(|&h| is_committable(core, &core.ops[h])) {
                break;
            }
            let faulting = group.iter().copied().find(|&h| {
                let op = &core.ops[h];
                op.exception.is_some() || op.info.class == OpClass::Undefined
            });
            if let Some(h) = faulting {
                if pos == 0 {
                    let op = &core.ops[h];
                    let action = if op.exception == Some(Fault::Transient) {
                        CommitAction::Exception(h)
                    } else {
                        CommitAction::Fault(h)
                    };
                    plan.push((tid, action));
                }
                break;
            }
            budget = budget.saturating_sub(group.len());
            pos += group.len();
            plan.push((tid, CommitAction::Commit(group)));
        }
        if budget == 0 {
            break;
        }
    }
    plan
}

impl Core {
    fn apply_commit(&mut self, plan: Vec<(usize, CommitAction)>) -> SimResult<()> {
        let mut stopped = vec![false; self.threads.len()];
        let mut last_tid = None;
        for (tid, action) in plan {
            if stopped[tid] {
                continue;
            }
            match action {
                CommitAction::Commit(group) => {
                    if !self.is_head_group(tid, &group) {
                        stopped[tid] = true;
                        continue;
                    }
                    let mut exit = None;
                    for h in group {
                        if let Some(e) = self.commit_op(h)? {
                            exit = Some(e);
                        }
                    }
                    last_tid = Some(tid);
                    if let Some(exit) = exit {
                        self.finish_thread(tid, exit)?;
                        stopped[tid] = true;
                    }
                }
                CommitAction::Exception(h) => {
                    if self.is_head_fault(tid, h) {
                        self.recover_exception(h)?;
                    }
                    stopped[tid] = true;
                }
                CommitAction::Fault(h) => {
                    stopped[tid] = true;
                    if !self.is_head_fault(tid, h) {
                        continue;
                    }
                    let op = &self.ops[h];
                    let reason = if op.exception.is_some() {
                        "fatal exception"
                    } else {
                        "undefined instruction"
                    };
                    return Err(SimError::Unsupported(format!("{op} cannot commit: {reason}")));
                }
            }
        }
        if let Some(tid) = last_tid {
            self.commit_thread = (tid + 1) % self.threads.len();
        }
        Ok(())
    }

    /// True if `h` still faults and belongs to the oldest in-flight instruction of `tid`.
    fn is_head_fault(&self, tid: usize, h: OpHandle) -> bool {
        let faulting = self
            .ops
            .get(h)
            .is_some_and(|op| op.exception.is_some() || op.info.class == OpClass::Undefined);
        let inorder = &self.threads[tid].inorder;
        faulting && inorder.front() == Some(inorder.front_op_of_same_pc(&self.ops, h))
    }

    /// True if `group` is still the oldest in-flight instruction of `tid` and may commit.
    fn is_head_group(&self, tid: usize, group: &[OpHandle]) -> bool {
        let inorder = &self.threads[tid].inorder;
        group.iter().enumerate().all(|(i, &h)| {
            inorder.get(i) == Some(h)
                && self
                    .ops
                    .get(h)
                    .is_some_and(|op| is_committable(self, op) && op.exception.is_none())
        })
    }
}
