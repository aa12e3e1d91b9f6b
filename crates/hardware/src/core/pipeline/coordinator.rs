//! Op Lifecycle Coordination.
//!
//! This module implements the transitions that touch many structures at once. It provides:
//! 1. **Commit:** Makes one op architectural: memory, committed rename state, predictor
//!    training and system calls.
//! 2. **Retirement:** Releases committed ops in program order once their retire event fired.
//! 3. **Flush:** Squashes a thread's youngest ops back to a given op.
//! 4. **Reschedule:** Returns an op to its scheduler so it executes again.
//! 5. **Thread exit:** Stops a thread whose process terminated.
//!
//! A committed `ReadFileToMemory` call also squashes and refetches everything younger.

use tracing::info;

use crate::common::{SimError, SimResult};
use crate::core::Core;
use crate::core::events::OpEventKind;
use crate::core::hooks::HookPoint;
use crate::core::op::{OpHandle, OpStatus};
use crate::emu::{CommitOutcome, OpClass};
use crate::sim::system::SystemNotification;

/// A committed op ended its thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ThreadExit {
    /// Exit code passed to the exit system call, if any.
    pub code: Option<u64>,
}

impl Core {
    /// Commits the oldest in-flight op of its thread.
    ///
    /// # Returns
    ///
    /// `Some` if the op terminates its thread: an exit system call or a control transfer
    /// to address zero.
    pub(crate) fn commit_op(&mut self, h: OpHandle) -> SimResult<Option<ThreadExit>> {
        self.hook_enter(HookPoint::Commit, h);
        self.set_status(h, OpStatus::Committing);
        let now = self.cycle();
        let op = &self.ops[h];
        let (tid, class, last_micro_op) = (op.tid, op.info.class, op.info.is_last_micro_op());

        let thread = &mut self.threads[tid];
        for id in [op.before_checkpoint, op.after_checkpoint].into_iter().flatten() {
            thread.checkpoints.commit(id)?;
        }
        let store_latency = thread.mem_order.commit(
            &self.ops,
            h,
            self.emulator.mem_image_mut(),
            self.caches.as_mut(),
            now,
        );
        for (&logical, &phys) in op.info.dsts.iter().zip(&op.dsts) {
            let _previous = thread.committed_map.set(logical, phys);
        }
        let next_pc = op.next_pc.unwrap_or(op.info.fallthrough);
        if class == OpClass::Branch {
            thread.committed_history.push(next_pc != op.info.fallthrough);
        }
        if class.is_store() {
            thread.mem_dep.release(h, op.pc);
        }
        if class.is_branch() && last_micro_op {
            let _ = thread.committed_ras.update(&op.info);
            self.bpred.train(op.pc, &op.info, op.history, next_pc);
        }
        if let Some(s) = op.scheduler {
            self.schedulers[s].remove(h);
        }

        let mut exit = None;
        let mut serialize = false;
        if class.is_syscall() {
            let srcs: Vec<u64> = op.srcs.iter().map(|&r| self.regs.value(r)).collect();
            match self.emulator.commit_syscall(op.pid, op.pc, &op.info, &srcs)? {
                CommitOutcome::Continue => {}
                CommitOutcome::Exit(code) => exit = Some(ThreadExit { code: Some(code) }),
                CommitOutcome::Notify(notification) => {
                    // Younger loads may already have read the memory this call just wrote.
                    serialize = matches!(notification, SystemNotification::ReadFileToMemory { .. });
                    notification.deliver(self.system.as_mut());
                }
            }
        }
        let resume_pc = next_pc;
        if class.is_branch() && op.next_pc == Some(0) {
            exit = Some(ThreadExit { code: None });
        }

        self.threads[tid].inorder.commit(h)?;
        self.ops[h].store_latency = store_latency;
        self.set_status(h, OpStatus::Committed);
        let delay = self.config().pipeline.commit_latency.max(store_latency);
        self.schedule(h, OpEventKind::Retire, delay)?;

        self.last_commit_cycle = now;
        self.stats.committed_ops += 1;
        if last_micro_op {
            self.stats.committed_insts += 1;
        }
        *self.stats.inst_mix.entry(class.name()).or_insert(0) += 1;
        self.hook_exit(HookPoint::Commit, h);
        if serialize && exit.is_none() {
            self.refetch_after_commit(tid, resume_pc)?;
        }
        Ok(exit)
    }

    /// Squashes everything thread `tid` has in flight and resumes fetch at `pc` from the
    /// committed state.
    fn refetch_after_commit(&mut self, tid: usize, pc: u64) -> SimResult<()> {
        if let Some(front) = self.threads[tid].inorder.front() {
            let _ = self.flush_backward(tid, front)?;
        }
        let thread = &mut self.threads[tid];
        thread.reset_to_committed();
        thread.fetch_pc = pc;
        Ok(())
    }

    /// Retires a committed op, then releases the committed prefix of its thread that has
    /// retired.
    pub(crate) fn retire(&mut self, h: OpHandle) -> SimResult<()> {
        if self.ops[h].status != OpStatus::Committed {
            return Ok(());
        }
        self.hook_enter(HookPoint::Retire, h);
        self.set_status(h, OpStatus::Retired);
        self.hook_exit(HookPoint::Retire, h);

        let tid = self.ops[h].tid;
        while let Some(front) = self.threads[tid].inorder.committed_front() {
            if self.ops[front].status != OpStatus::Retired {
                break;
            }
            let _ = self.threads[tid].inorder.pop_committed();
            self.threads[tid].mem_order.retire(front);
            let op = self
                .ops
                .release(front)
                .ok_or_else(|| SimError::invariant(format!("{front} released twice")))?;
            for reg in op.prev_dsts {
                self.regs.release(reg);
            }
            for &src in &op.srcs {
                self.regs.remove_consumer(src, front);
            }
            self.stats.retired_ops += 1;
            if op.info.is_last_micro_op() {
                self.stats.retired_insts += 1;
            }
        }
        Ok(())
    }

    /// Squashes every in-flight op of thread `tid` from the youngest back to `start`,
    /// inclusive.
    ///
    /// # Returns
    ///
    /// The number of squashed ops.
    pub(crate) fn flush_backward(&mut self, tid: usize, start: OpHandle) -> SimResult<u64> {
        if !self.threads[tid].inorder.contains(start) {
            return Err(SimError::invariant(format!(
                "flush from {start}, which is not in flight on thread {tid}"
            )));
        }
        let mut count = 0;
        while let Some(h) = self.threads[tid].inorder.pop_back() {
            self.flush_op(tid, h)?;
            count += 1;
            if h == start {
                break;
            }
        }
        self.latches.retain_live(&self.ops);
        Ok(count)
    }

    fn flush_op(&mut self, tid: usize, h: OpHandle) -> SimResult<()> {
        self.hook_enter(HookPoint::Flush, h);
        let op = &mut self.ops[h];
        op.epochs.event += 1;
        let (scheduler, before, after, pc) =
            (op.scheduler, op.before_checkpoint, op.after_checkpoint, op.pc);
        if let Some(s) = scheduler {
            self.schedulers[s].remove(h);
        }
        let thread = &mut self.threads[tid];
        thread.mem_order.flush(h);
        thread.mem_dep.release(h, pc);
        if let Some(id) = after {
            thread.checkpoints.flush(id)?;
        }
        if let Some(id) = before {
            thread.checkpoints.flush(id)?;
        }
        let op = &self.ops[h];
        for &dst in &op.dsts {
            self.regs.release(dst);
        }
        for &src in &op.srcs {
            self.regs.remove_consumer(src, h);
        }
        self.set_status(h, OpStatus::Flushed);
        self.hook_exit(HookPoint::Flush, h);
        let _flushed = self.ops.release(h);
        self.stats.flushed_ops += 1;
        Ok(())
    }

    /// Returns `h` to its scheduler so that it executes again.
    ///
    /// Its results are discarded and its pending events cancelled. An op still waiting in
    /// its scheduler is only re-checked against its sources.
    ///
    /// # Returns
    ///
    /// True if the op will be issued again.
    pub(crate) fn reschedule(&mut self, h: OpHandle) -> bool {
        let op = &self.ops[h];
        if !op.status.is_dispatched() {
            return false;
        }
        let Some(s) = op.scheduler else {
            return false;
        };
        if op.status == OpStatus::Dispatched {
            let _requeued = self.schedulers[s].reschedule(&self.regs, op);
            return false;
        }

        self.hook_enter(HookPoint::Reschedule, h);
        for &dst in &self.ops[h].dsts {
            self.regs.reset_ready(dst);
        }
        let op = &mut self.ops[h];
        op.epochs.event += 1;
        op.result = None;
        op.mem = None;
        op.forwarded_from = None;
        op.next_pc = None;
        op.exception = None;
        self.set_status(h, OpStatus::Dispatched);
        let requeued = self.schedulers[s].reschedule(&self.regs, &self.ops[h]);
        self.hook_exit(HookPoint::Reschedule, h);
        self.stats.rescheduled_ops += 1;
        requeued
    }

    /// Stops thread `tid` after its process terminated and squashes whatever it still has
    /// in flight.
    pub(crate) fn finish_thread(&mut self, tid: usize, exit: ThreadExit) -> SimResult<()> {
        let thread = &mut self.threads[tid];
        thread.active = false;
        thread.exit_code = exit.code;
        let pid = thread.pid;
        let front = thread.inorder.front();
        self.system.notify_process_termination(pid);
        info!(tid, pid, exit_code = ?exit.code, cycle = self.cycle(), "thread finished");
        if let Some(front) = front {
            let _ = self.flush_backward(tid, front)?;
        }
        Ok(())
    }
}
