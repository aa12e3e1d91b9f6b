//! Issue, Execute and Write-Back.
//!
//! This module implements the deferred half of the pipeline: everything that happens to an
//! op between selection and commit is driven by op events on the time wheel. It provides:
//! 1. **Issue:** Schedules execution and the speculative wake-up of consumers, assuming the
//!    op finishes in its predicted latency. A load's latency depends on whether the hit/miss
//!    predictor expects it to hit.
//! 2. **Execution:** Computes the result through the emulator. Loads read through the
//!    memory-order manager and the data cache; stores only record their access.
//! 3. **Finish:** Writes results, wakes consumers that were not woken early and raises
//!    branch and memory-order recoveries. Access-order violations also train the memory
//!    dependence predictor.
//! 4. **Latency misprediction:** Detects loads still executing when their consumers were
//!    scheduled to read them.
//! 5. **Write-back:** Moves finished ops to the commit point.

use crate::common::{MemAccessResult, SimResult};
use crate::core::Core;
use crate::core::events::OpEventKind;
use crate::core::hooks::HookPoint;
use crate::core::op::{OpHandle, OpStatus};
use crate::core::recoverer::DataPredType;
use crate::core::units::lsu::{MemOrderManager, MemViolation};
use crate::emu::{Fault, OpClass};

impl Core {
    /// Sends a selected op toward its execution unit.
    ///
    /// The unit was reserved by the scheduler. Consumers in scheduler `t` are woken so that
    /// they reach execution no earlier than the predicted finish, and no earlier than the
    /// communication latency between the two schedulers allows. A load predicted to miss is
    /// expected to take the miss latency of the first cache level.
    pub(crate) fn issue(&mut self, s: usize, h: OpHandle) -> SimResult<()> {
        self.hook_enter(HookPoint::Issue, h);
        self.set_status(h, OpStatus::Issuing);
        let op = &self.ops[h];
        let (class, pc, tid) = (op.info.class, op.pc, op.tid);
        let scheduler = &self.schedulers[s];
        let il = scheduler.issue_latency();
        let mut predicted = scheduler.exec_latency(class);
        let mut hit = true;
        if class.is_load() {
            hit = self.hit_miss.predict(pc, tid);
            predicted += if hit {
                self.caches.static_latency()
            } else {
                self.caches.miss_latency()
            };
        }
        let op = &mut self.ops[h];
        op.predicted_latency = predicted;
        op.predicted_hit = hit;
        self.schedule(h, OpEventKind::Execute, il)?;

        if !self.ops[h].dsts.is_empty() {
            for t in 0..self.schedulers.len() {
                let Some(com) = self.schedulers[s].communication_latency(t) else {
                    continue;
                };
                let target_il = self.schedulers[t].issue_latency();
                let delay = (predicted + il).saturating_sub(target_il).max(com).max(1);
                self.schedule(h, OpEventKind::WakeUp { target: t }, delay - 1)?;
            }
        }
        self.hook_exit(HookPoint::Issue, h);
        Ok(())
    }

    /// Marks the results of `h` readable by scheduler `target` and wakes its waiting
    /// consumers there.
    pub(crate) fn wakeup(&mut self, h: OpHandle, target: usize) {
        let dsts = self.ops[h].dsts.clone();
        for dst in dsts {
            self.regs.set_ready(dst, target);
            for &c in self.regs.consumers(dst) {
                let Some(consumer) = self.ops.get(c) else {
                    continue;
                };
                if consumer.scheduler == Some(target) && consumer.status == OpStatus::Dispatched {
                    let _woken = self.schedulers[target].wakeup(&self.regs, consumer);
                }
            }
        }
    }

    pub(crate) fn execute(&mut self, h: OpHandle) -> SimResult<()> {
        if self.ops[h].status != OpStatus::Issuing {
            return Ok(());
        }
        self.hook_enter(HookPoint::Execute, h);
        self.set_status(h, OpStatus::Executing);

        let now = self.cycle();
        let op = &self.ops[h];
        let (tid, pid, pc, class) = (op.tid, op.pid, op.pc, op.info.class);
        let srcs: Vec<u64> = op.srcs.iter().map(|&r| self.regs.value(r)).collect();
        let effect = self.emulator.execute(pid, pc, &op.info, &srcs);
        let mut exception = effect.fault;
        let mut cache_latency = 0;

        match (class, effect.mem) {
            (OpClass::Load, Some(access)) => {
                let load = self.threads[tid].mem_order.read(
                    &self.ops,
                    h,
                    access,
                    self.emulator.mem_image(),
                );
                cache_latency = if load.forwarded_from.is_some() {
                    self.caches.static_latency()
                } else {
                    self.caches.read(&load.access, now).latency
                };
                let hit = cache_latency <= self.caches.static_latency();
                self.hit_miss.train(pc, tid, self.ops[h].predicted_hit, hit);
                self.stats.load_accesses += 1;
                if load.access.result == MemAccessResult::AccessViolation {
                    exception = Some(Fault::Fatal);
                }
                let op = &mut self.ops[h];
                op.result = Some(load.access.value);
                op.mem = Some(load.access);
                op.forwarded_from = load.forwarded_from;
            }
            (OpClass::Store, Some(access)) => MemOrderManager::write(&mut self.ops, h, access),
            _ => self.ops[h].result = effect.dst,
        }

        let unit_latency = self.ops[h]
            .scheduler
            .map_or(1, |s| self.schedulers[s].exec_latency(class));
        let latency = unit_latency + cache_latency;
        let op = &mut self.ops[h];
        op.latency = latency;
        op.next_pc = effect.next_pc;
        op.exception = exception;
        let predicted = op.predicted_latency;

        self.schedule(h, OpEventKind::Finish, latency.saturating_sub(1))?;
        if latency > predicted {
            self.schedule(h, OpEventKind::DetectLatPredMiss, predicted.saturating_sub(1))?;
        }
        self.hook_exit(HookPoint::Execute, h);
        Ok(())
    }

    pub(crate) fn finish(&mut self, h: OpHandle) -> SimResult<()> {
        if self.ops[h].status != OpStatus::Executing {
            return Ok(());
        }
        self.hook_enter(HookPoint::Finish, h);
        self.set_status(h, OpStatus::Finished);

        let op = &self.ops[h];
        let dsts = op.dsts.clone();
        if let Some(value) = op.result {
            for &dst in &dsts {
                self.regs.set_value(dst, value);
            }
        }
        if let Some(s) = op.scheduler {
            self.schedulers[s].finished(h);
        }
        self.ops[h].epochs.wakeup += 1;
        if dsts.iter().any(|&d| !self.regs.is_fully_ready(d)) {
            for target in 0..self.schedulers.len() {
                self.schedule(h, OpEventKind::WakeUp { target }, 1)?;
            }
        }
        self.schedule(h, OpEventKind::WriteBackBegin, 1)?;
        self.hook_exit(HookPoint::Finish, h);

        // Recovery may flush `h`, so it runs last.
        let op = &self.ops[h];
        if op.exception.is_some() {
            return Ok(());
        }
        let class = op.info.class;
        if class.is_branch() && op.is_mispredicted() {
            return self.recover_bpred_miss(h);
        }
        if class.is_mem() {
            let tid = op.tid;
            let violation = self.threads[tid].mem_order.finished(&self.ops, h);
            match violation {
                Some(MemViolation::AccessOrder { store, load }) => {
                    let (store_pc, load_pc) = (self.ops[store].pc, self.ops[load].pc);
                    self.threads[tid].mem_dep.order_conflicted(store_pc, load_pc);
                    self.recover_data_pred_miss(store, Some(load), DataPredType::AddressMatch)?;
                }
                Some(MemViolation::PartialLoad { store, load }) => {
                    self.recover_data_pred_miss(
                        store.unwrap_or(load),
                        Some(load),
                        DataPredType::PartialLoad,
                    )?;
                }
                None => {}
            }
        }
        Ok(())
    }

    pub(crate) fn writeback_begin(&mut self, h: OpHandle) -> SimResult<()> {
        if self.ops[h].status != OpStatus::Finished {
            return Ok(());
        }
        self.set_status(h, OpStatus::WritingBack);
        let latency = self.config().pipeline.writeback_latency;
        self.schedule(h, OpEventKind::WriteBackEnd, latency.saturating_sub(1))
    }

    pub(crate) fn writeback_end(&mut self, h: OpHandle) {
        if self.ops[h].status == OpStatus::WritingBack {
            self.set_status(h, OpStatus::WrittenBack);
        }
    }

    /// Consumers of `h` were scheduled for its predicted latency; if it is still executing,
    /// they read a value that does not exist yet.
    pub(crate) fn detect_latency_miss(&mut self, h: OpHandle) -> SimResult<()> {
        if self.ops[h].status != OpStatus::Executing {
            return Ok(());
        }
        self.recover_data_pred_miss(h, None, DataPredType::Latency)
    }
}
