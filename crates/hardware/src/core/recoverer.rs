//! Misprediction recovery.
//!
//! This module restores a thread after a speculative event turned out wrong. It provides:
//! 1. **Branch recovery:** `recover_bpred_miss` rolls back to the checkpoint after the
//!    branch, squashes the wrong path and redirects fetch.
//! 2. **Exception recovery:** `recover_exception` squashes every in-flight op from the
//!    faulting instruction and refetches it from the committed state.
//! 3. **Data recovery:** `recover_data_pred_miss` handles latency, address-match, value and
//!    partial-load mispredictions with the configured start point and mechanism.
//!
//! Recoveries are ordinary control flow. Only broken invariants (e.g. a missing checkpoint)
//! surface as errors.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::common::{SimError, SimResult};
use crate::config::{DataRecoveryConfig, RecoveryFrom, RecoveryPolicy};
use crate::core::Core;
use crate::core::op::{OpHandle, OpStatus};
use crate::emu::OpClass;

/// Kind of data misprediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataPredType {
    /// A load took longer than its consumers were scheduled for.
    Latency,
    /// A load executed before an older store to an overlapping address.
    AddressMatch,
    /// A predicted value was wrong.
    Value,
    /// A load only partially overlapped an older in-flight store.
    PartialLoad,
}

/// Invocation and op counts of one recovery class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryCounter {
    /// Recoveries taken.
    pub count: u64,
    /// Ops flushed or rescheduled by them.
    pub ops: u64,
}

impl RecoveryCounter {
    fn record(&mut self, ops: u64) {
        self.count += 1;
        self.ops += ops;
    }

    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.ops += other.ops;
    }
}

/// Recovery counters per class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryStats {
    /// Branch mispredictions.
    pub bpred: RecoveryCounter,
    /// Exceptions at commit.
    pub exception: RecoveryCounter,
    /// Load latency mispredictions.
    pub latency: RecoveryCounter,
    /// Memory access-order violations.
    pub address_match: RecoveryCounter,
    /// Value mispredictions.
    pub value: RecoveryCounter,
    /// Partial-load violations.
    pub partial_load: RecoveryCounter,
}

impl RecoveryStats {
    /// Counter of a data misprediction class.
    pub fn data(&self, kind: DataPredType) -> RecoveryCounter {
        match kind {
            DataPredType::Latency => self.latency,
            DataPredType::AddressMatch => self.address_match,
            DataPredType::Value => self.value,
            DataPredType::PartialLoad => self.partial_load,
        }
    }

    fn data_mut(&mut self, kind: DataPredType) -> &mut RecoveryCounter {
        match kind {
            DataPredType::Latency => &mut self.latency,
            DataPredType::AddressMatch => &mut self.address_match,
            DataPredType::Value => &mut self.value,
            DataPredType::PartialLoad => &mut self.partial_load,
        }
    }

    /// Adds another thread's counters.
    pub fn merge(&mut self, other: &Self) {
        self.bpred.merge(other.bpred);
        self.exception.merge(other.exception);
        self.latency.merge(other.latency);
        self.address_match.merge(other.address_match);
        self.value.merge(other.value);
        self.partial_load.merge(other.partial_load);
    }

    /// Recoveries of every class.
    pub fn total(&self) -> u64 {
        [
            self.bpred,
            self.exception,
            self.latency,
            self.address_match,
            self.value,
            self.partial_load,
        ]
        .iter()
        .map(|c| c.count)
        .sum()
    }

    /// Rows for printing, in a fixed order.
    pub fn rows(&self) -> [(&'static str, RecoveryCounter); 6] {
        [
            ("bpred", self.bpred),
            ("exception", self.exception),
            ("latency", self.latency),
            ("address_match", self.address_match),
            ("value", self.value),
            ("partial_load", self.partial_load),
        ]
    }
}

impl Core {
    fn data_recovery_config(&self, kind: DataPredType) -> DataRecoveryConfig {
        let recovery = &self.config().recovery;
        match kind {
            DataPredType::Latency => recovery.latency,
            DataPredType::AddressMatch => recovery.address_match,
            DataPredType::Value => recovery.value,
            DataPredType::PartialLoad => recovery.partial_load,
        }
    }

    /// Recovers from a mispredicted control transfer.
    ///
    /// Restores the checkpoint taken after `branch`, squashes every younger op, corrects the
    /// last global history bit and resumes fetch at the resolved successor.
    pub(crate) fn recover_bpred_miss(&mut self, branch: OpHandle) -> SimResult<()> {
        let (tid, class, next_pc, fallthrough, after) = {
            let op = &self.ops[branch];
            (
                op.tid,
                op.info.class,
                op.next_pc.unwrap_or(op.info.fallthrough),
                op.info.fallthrough,
                op.after_checkpoint,
            )
        };
        let after = after.ok_or_else(|| {
            SimError::invariant(format!("{branch} mispredicted without an after checkpoint"))
        })?;
        self.threads[tid].checkpoints.recover(after)?;

        let flushed = match self.threads[tid].inorder.next_op(branch) {
            Some(next) => self.flush_backward(tid, next)?,
            None => 0,
        };

        let latency = self.config().recovery.bpred_recovery_latency;
        let now = self.cycle();
        let thread = &mut self.threads[tid];
        if class == OpClass::Branch {
            let history = thread.history;
            thread
                .checkpoints
                .data_mut(history)
                .set_last(next_pc != fallthrough);
        }
        thread.fetch_pc = next_pc;
        thread.fetch_stall_until = now + latency;
        thread.recovery.bpred.record(flushed);
        self.ops[branch].predicted_next_pc = next_pc;
        self.stats.branch_mispredictions += 1;
        debug!(op = %branch, tid, next_pc, flushed, "branch misprediction recovered");
        Ok(())
    }

    /// Recovers from an exception raised by the oldest in-flight op.
    ///
    /// Every in-flight op of the thread is squashed and the speculative state is reset to the
    /// committed state, so the faulting instruction is fetched again.
    pub(crate) fn recover_exception(&mut self, causer: OpHandle) -> SimResult<()> {
        let tid = self.ops[causer].tid;
        let front = self.threads[tid].inorder.front_op_of_same_pc(&self.ops, causer);
        let pc = self.ops[front].pc;
        let flushed = self.flush_backward(tid, front)?;

        let latency = self.config().recovery.exception_recovery_latency;
        let now = self.cycle();
        let thread = &mut self.threads[tid];
        thread.reset_to_committed();
        thread.fetch_pc = pc;
        thread.fetch_stall_until = now + latency;
        thread.recovery.exception.record(flushed);
        debug!(tid, pc, flushed, "exception recovered");
        Ok(())
    }

    /// Recovers from a data misprediction.
    ///
    /// # Arguments
    ///
    /// * `producer` - The op whose result or timing was mispredicted.
    /// * `consumer` - The op that observed the wrong data, when known.
    /// * `kind` - Misprediction class; selects the configured start point and mechanism.
    pub(crate) fn recover_data_pred_miss(
        &mut self,
        producer: OpHandle,
        consumer: Option<OpHandle>,
        kind: DataPredType,
    ) -> SimResult<()> {
        let DataRecoveryConfig { from, policy } = self.data_recovery_config(kind);
        let tid = self.ops[producer].tid;

        if kind == DataPredType::Latency {
            for reg in self.ops[producer].dsts.clone() {
                self.regs.reset_ready(reg);
            }
        }

        // Starting at the next instruction skips consumers among the producer's own micro-ops.
        let mut in_instruction = 0;
        if kind == DataPredType::Latency && from == RecoveryFrom::NextOfProducer {
            let consumers = self.direct_consumers(producer);
            let inside: Vec<OpHandle> = self.threads[tid]
                .inorder
                .later_micro_ops(&self.ops, producer)
                .into_iter()
                .filter(|h| consumers.contains(h))
                .collect();
            in_instruction = self.reschedule_consumers(inside)?;
        }

        let recovered = if policy == RecoveryPolicy::ReissueSelective {
            let first = self.direct_consumers(producer);
            let mut count = 0;
            if from == RecoveryFrom::Producer && self.reschedule(producer) {
                count += 1;
            }
            count + self.reschedule_consumers(first)?
        } else {
            let start = match from {
                RecoveryFrom::Producer => Some(producer),
                RecoveryFrom::NextOfProducer => {
                    self.threads[tid].inorder.next_pc_op(&self.ops, producer)
                }
                RecoveryFrom::Consumer => consumer.or_else(|| {
                    (kind == DataPredType::Latency)
                        .then(|| self.direct_consumers(producer).first().copied())
                        .flatten()
                }),
            };
            match start {
                Some(start) => self.recover_from(tid, start, policy)?,
                None => 0,
            }
        };
        let ops = recovered + in_instruction;

        self.threads[tid].recovery.data_mut(kind).record(ops);
        debug!(
            producer = %producer,
            consumer = ?consumer,
            ?kind,
            ?from,
            ?policy,
            ops,
            "data misprediction recovered"
        );
        Ok(())
    }

    /// Applies a non-selective mechanism from `start`.
    fn recover_from(&mut self, tid: usize, start: OpHandle, policy: RecoveryPolicy) -> SimResult<u64> {
        match policy {
            RecoveryPolicy::Refetch => self.refetch_from(tid, start),
            RecoveryPolicy::ReissueAll | RecoveryPolicy::ReissueNotFinished => {
                let mut count = 0;
                for h in self.threads[tid].inorder.from_op(start) {
                    if policy == RecoveryPolicy::ReissueNotFinished
                        && self.ops[h].status.is_finished()
                    {
                        continue;
                    }
                    if self.reschedule(h) {
                        count += 1;
                    }
                }
                Ok(count)
            }
            RecoveryPolicy::ReissueSelective => Err(SimError::invariant(
                "selective reissue has no start op",
            )),
        }
    }

    /// Squashes the instruction containing `start` and everything younger, then refetches it.
    fn refetch_from(&mut self, tid: usize, start: OpHandle) -> SimResult<u64> {
        let thread = &self.threads[tid];
        let target = thread.inorder.front_op_of_same_pc(&self.ops, start);
        let pc = self.ops[target].pc;
        let checkpoint = self.ops[target].before_checkpoint.or_else(|| {
            thread
                .inorder
                .prev_op(target)
                .and_then(|prev| self.ops[prev].after_checkpoint)
        });
        let is_oldest = thread.inorder.front() == Some(target);

        match checkpoint {
            Some(id) => self.threads[tid].checkpoints.recover(id)?,
            None if is_oldest => self.threads[tid].reset_to_committed(),
            None => {
                return Err(SimError::invariant(format!(
                    "a necessary checkpoint is not taken for {target}"
                )));
            }
        }
        let flushed = self.flush_backward(tid, target)?;
        self.threads[tid].fetch_pc = pc;
        Ok(flushed)
    }

    /// Ops that read a result of `producer`: register consumers and, for a store, the
    /// younger executed loads that overlap it.
    fn direct_consumers(&self, producer: OpHandle) -> Vec<OpHandle> {
        let op = &self.ops[producer];
        let mut out: Vec<OpHandle> = Vec::new();
        for &reg in &op.dsts {
            for &c in self.regs.consumers(reg) {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        if op.info.class == OpClass::Store {
            for c in self.threads[op.tid].mem_order.consumer_loads(&self.ops, producer) {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Reschedules `first` and, transitively, every consumer reachable from it.
    ///
    /// # Returns
    ///
    /// The number of ops returned to their schedulers.
    fn reschedule_consumers(&mut self, first: Vec<OpHandle>) -> SimResult<u64> {
        let mut seen: HashSet<OpHandle> = HashSet::new();
        let mut stack = first;
        stack.reverse();
        let mut count = 0;
        while let Some(h) = stack.pop() {
            if !seen.insert(h) || !self.ops.is_live(h) {
                continue;
            }
            if self.ops[h].status < OpStatus::Dispatched || self.ops[h].status.is_committed() {
                continue;
            }
            let next = self.direct_consumers(h);
            if self.reschedule(h) {
                count += 1;
            }
            stack.extend(next.into_iter().rev());
        }
        Ok(count)
    }
}
