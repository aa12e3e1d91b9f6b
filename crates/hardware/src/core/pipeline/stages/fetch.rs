//! Instruction Fetch Stage.
//!
//! This module implements the first stage of the pipeline. Each cycle it picks one active
//! thread round-robin, decodes whole instructions from its fetch PC, predicts their
//! successors and allocates their ops. It stops at a predicted-taken control transfer, at
//! the fetch width, or when the arena, the in-order list, the checkpoint master or the
//! fetch latch cannot hold the next instruction. Returns take their target from the
//! thread's return address stack.

use tracing::trace;

use crate::common::{SimError, SimResult};
use crate::config::CheckpointingPolicy;
use crate::core::Core;
use crate::core::checkpoint::{CheckpointId, CheckpointSlot};
use crate::core::hooks::HookPoint;
use crate::core::op::Op;
use crate::core::units::bru::Prediction;
use crate::emu::{OpClass, OpInfo};
use crate::sim::clock::{Clocked, Priority, Update};

/// One decoded instruction with its predictions.
#[derive(Clone, Debug)]
struct FetchedInst {
    pc: u64,
    infos: Vec<OpInfo>,
    predictions: Vec<Prediction>,
    /// A checkpoint is needed before the first op.
    before: bool,
    /// A checkpoint is needed after the last op.
    after: bool,
}

/// Work decided for one cycle.
#[derive(Clone, Debug)]
struct FetchPlan {
    tid: usize,
    start_pc: u64,
    next_pc: u64,
    insts: Vec<FetchedInst>,
}

/// The fetch stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchStage;

impl Clocked<Core> for FetchStage {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn priority(&self) -> Priority {
        Priority::Stage
    }

    fn evaluate(&self, core: &Core) -> Option<Update<Core>> {
        let plan = plan_fetch(core)?;
        Some(Box::new(move |core: &mut Core| core.apply_fetch(plan)))
    }
}

/// Picks the thread to fetch for this cycle.
fn pick_thread(core: &Core) -> Option<usize> {
    let n = core.threads.len();
    let now = core.cycle();
    (0..n)
        .map(|i| (core.fetch_thread + i) % n)
        .find(|&t| {
            let thread = &core.threads[t];
            thread.active && now >= thread.fetch_stall_until
        })
}

fn plan_fetch(core: &Core) -> Option<FetchPlan> {
    let room = core.latches.fetch_rename.room();
    if room == 0 {
        return None;
    }
    let tid = pick_thread(core)?;
    let thread = &core.threads[tid];
    let width = core.config().pipeline.fetch_width;
    let all = core.config().pipeline.checkpointing == CheckpointingPolicy::All;
    let mut history = thread.speculative_history();
    let mut ras = thread.return_stack().clone();
    let mut pc = thread.fetch_pc;
    let mut ops = 0;
    let mut checkpoints = 0;
    let mut insts = Vec::new();

    loop {
        let infos = core.emulator.decode(thread.pid, pc);
        let n = infos.len();
        if n == 0 {
            break;
        }
        if ops > 0 && ops + n > width {
            break;
        }
        let (before, after) = core.checkpoint_needs(&infos);
        let needed = if all {
            2 * n
        } else {
            usize::from(before) + usize::from(after)
        };
        if core.ops.free_count() < ops + n
            || !thread.inorder.can_push(ops + n)
            || !thread.checkpoints.can_create(checkpoints + needed)
            || room < ops + n
        {
            break;
        }

        let mut predictions = Vec::with_capacity(n);
        for info in &infos {
            let mut prediction = core.bpred.predict(pc, info, history.value());
            if let Some(addr) = ras.update(info) {
                prediction.next_pc = addr;
            }
            if info.class == OpClass::Branch {
                history.push(prediction.taken.unwrap_or(false));
            }
            predictions.push(prediction);
        }
        let fallthrough = infos[n - 1].fallthrough;
        let next = predictions.last().map_or(fallthrough, |p| p.next_pc);

        ops += n;
        checkpoints += needed;
        insts.push(FetchedInst {
            pc,
            infos,
            predictions,
            before,
            after,
        });
        pc = next;
        if next != fallthrough || ops >= width {
            break;
        }
    }

    if insts.is_empty() {
        return None;
    }
    Some(FetchPlan {
        tid,
        start_pc: thread.fetch_pc,
        next_pc: pc,
        insts,
    })
}

impl Core {
    fn apply_fetch(&mut self, plan: FetchPlan) -> SimResult<()> {
        let tid = plan.tid;
        {
            let thread = &self.threads[tid];
            if !thread.active || thread.fetch_pc != plan.start_pc {
                return Ok(());
            }
        }
        for inst in plan.insts {
            self.fetch_inst(tid, inst)?;
        }
        self.threads[tid].fetch_pc = plan.next_pc;
        self.fetch_thread = (tid + 1) % self.threads.len();
        Ok(())
    }

    fn take_checkpoint(&mut self, tid: usize) -> SimResult<CheckpointId> {
        let thread = &mut self.threads[tid];
        let id = thread.checkpoints.create()?;
        thread.checkpoints.backup(id, CheckpointSlot::Fetch)?;
        Ok(id)
    }

    fn fetch_inst(&mut self, tid: usize, inst: FetchedInst) -> SimResult<()> {
        let pid = self.threads[tid].pid;
        let all = self.config().pipeline.checkpointing == CheckpointingPolicy::All;
        let count = inst.infos.len();
        let pc = inst.pc;
        for (i, (info, prediction)) in inst.infos.into_iter().zip(inst.predictions).enumerate() {
            let before = if all || (i == 0 && inst.before) {
                Some(self.take_checkpoint(tid)?)
            } else {
                None
            };

            let serial = self.threads[tid].next_serial;
            self.threads[tid].next_serial += 1;
            let global_serial = self.take_global_serial();
            let thread = &mut self.threads[tid];
            let (history_handle, ras_handle) = (thread.history, thread.ras);
            let history = thread.checkpoints.data(history_handle).value();
            let is_branch = info.class.is_branch() && info.is_last_micro_op();
            if info.class == OpClass::Branch {
                thread
                    .checkpoints
                    .data_mut(history_handle)
                    .push(prediction.taken.unwrap_or(false));
            }
            let _ = thread.checkpoints.data_mut(ras_handle).update(&info);

            let h = self
                .ops
                .allocate(|h| {
                    let mut op = Op::new(h, tid, pid, pc, info);
                    op.serial = serial;
                    op.global_serial = global_serial;
                    op.predicted_next_pc = prediction.next_pc;
                    op.predicted_taken = prediction.taken;
                    op.history = history;
                    op.before_checkpoint = before;
                    op
                })
                .ok_or_else(|| SimError::invariant("op arena exhausted during fetch"))?;
            if all || (i + 1 == count && inst.after) {
                let id = self.take_checkpoint(tid)?;
                self.ops[h].after_checkpoint = Some(id);
            }

            self.hook_enter(HookPoint::Fetch, h);
            self.threads[tid].inorder.push_back(h);
            self.latches.fetch_rename.push(h);
            self.stats.fetched_ops += 1;
            if is_branch {
                self.stats.branch_lookups += 1;
            }
            trace!(op = %self.ops[h], "fetched");
            self.hook_exit(HookPoint::Fetch, h);
        }
        Ok(())
    }
}
