//! Out-of-order core definition and initialization.
//!
//! This module defines the central `Core` structure, the context every pipeline stage and
//! deferred event operates on. It coordinates the following:
//! 1. **Op storage:** The shared op arena, physical register file and schedulers.
//! 2. **Threads:** One `Thread` per simulated process with its own ordering structures.
//! 3. **Collaborators:** The emulator, the data cache hierarchy and the host system.
//! 4. **Events:** The time wheel and the zero-delay queue behind `EventContext`.
//!
//! Stages read the core during Evaluate and mutate it only from their update closures, so
//! every stage observes the same pre-cycle state.

/// Checkpoint master and typed providers.
pub mod checkpoint;

/// Deferred op events.
pub mod events;

/// Extension points around op state transitions.
pub mod hooks;

/// In-flight op instances and their arena.
pub mod op;

/// Pipeline stages, schedulers and ordering structures.
pub mod pipeline;

/// Branch, exception and data misprediction recovery.
pub mod recoverer;

/// Physical registers and rename maps.
pub mod regs;

/// Per-thread pipeline state.
pub mod thread;

/// Execution units, caches, branch prediction and the load/store unit.
pub mod units;

use std::collections::VecDeque;
use std::fmt;

use tracing::{info, trace};

use self::events::{OpEvent, OpEventKind};
use self::hooks::{HookPoint, Hooks};
use self::op::{OpArena, OpHandle, OpStatus};
use self::pipeline::latches::Latches;
use self::pipeline::scheduler::Scheduler;
use self::regs::{RegisterFile, RenameMap};
use self::thread::Thread;
use self::units::bru::BranchPredictorWrapper;
use self::units::cache::{CacheIf, CacheSystem};
use self::units::lsu::HitMissPred;
use crate::common::{SimError, SimResult};
use crate::config::{CheckpointingPolicy, Config, RecoveryFrom, RecoveryPolicy};
use crate::emu::{Emulator, OpClass, OpInfo};
use crate::sim::clock::{EventContext, Phase, Update};
use crate::sim::system::SystemIf;
use crate::sim::wheel::TimeWheel;
use crate::stats::CoreStats;

/// The simulated out-of-order core.
pub struct Core {
    config: Config,
    cycle: u64,
    phase: Phase,
    /// Every live op.
    pub(crate) ops: OpArena,
    /// Physical registers shared by all threads.
    pub(crate) regs: RegisterFile,
    /// Issue queues, indexed by scheduler number.
    pub(crate) schedulers: Vec<Scheduler>,
    /// Hardware threads.
    pub(crate) threads: Vec<Thread>,
    /// Front-end latches.
    pub(crate) latches: Latches,
    /// Branch predictor shared by all threads.
    pub(crate) bpred: BranchPredictorWrapper,
    /// Load hit/miss predictor shared by all threads.
    pub(crate) hit_miss: HitMissPred,
    /// Data cache hierarchy.
    pub(crate) caches: Box<dyn CacheIf>,
    /// Instruction semantics.
    pub(crate) emulator: Box<dyn Emulator>,
    /// Host process bookkeeping.
    pub(crate) system: Box<dyn SystemIf>,
    /// Registered extension points.
    pub(crate) hooks: Hooks,
    /// Pipeline counters.
    pub(crate) stats: CoreStats,
    wheel: TimeWheel<OpEvent>,
    immediate: VecDeque<OpEvent>,
    next_global_serial: u64,
    /// Thread fetch starts with next cycle.
    pub(crate) fetch_thread: usize,
    /// Thread commit starts with next cycle.
    pub(crate) commit_thread: usize,
    /// Cycle of the most recent commit.
    pub(crate) last_commit_cycle: u64,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("cycle", &self.cycle)
            .field("phase", &self.phase)
            .field("ops", &self.ops.len())
            .field("threads", &self.threads)
            .field("schedulers", &self.schedulers)
            .field("caches", &self.caches)
            .field("hooks", &self.hooks)
            .field("pending_events", &self.wheel.pending())
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Builds a core running one thread per emulator process.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated here; an inconsistent configuration is rejected before any
    ///   component is built.
    /// * `emulator` - Instruction semantics and the memory image.
    /// * `system` - Receives process termination and system call notifications.
    /// * `hooks` - Extension points invoked around op state transitions.
    ///
    /// # Returns
    ///
    /// `SimError::Config` if the configuration or the register file size is inconsistent.
    pub fn new(
        config: Config,
        emulator: Box<dyn Emulator>,
        system: Box<dyn SystemIf>,
        hooks: Hooks,
    ) -> SimResult<Self> {
        config.validate()?;
        let processes = emulator.process_count();
        if processes == 0 {
            return Err(SimError::config("the emulator has no process to run"));
        }
        let logical = emulator.register_count();
        config.validate_registers(logical, processes)?;

        let count = config.schedulers.len();
        let mut regs = RegisterFile::new(config.pipeline.physical_registers, count)?;
        let mut threads = Vec::with_capacity(processes);
        for tid in 0..processes {
            let pid = tid as u32;
            let mut map = Vec::with_capacity(logical);
            for reg in 0..logical {
                let phys = regs.allocate().ok_or_else(|| {
                    SimError::config("physical register file exhausted at reset")
                })?;
                regs.set_value(phys, emulator.initial_reg_value(pid, reg as u16));
                regs.set_fully_ready(phys);
                map.push(phys);
            }
            let entry = emulator.entry_pc(pid);
            threads.push(Thread::new(tid, pid, &config, RenameMap::new(map), entry));
        }

        let schedulers = config
            .schedulers
            .iter()
            .enumerate()
            .map(|(i, s)| Scheduler::new(i, s, config.remove_policy(i), count))
            .collect();

        info!(
            threads = processes,
            schedulers = count,
            fetch_width = config.pipeline.fetch_width,
            "core initialized"
        );
        Ok(Self {
            ops: OpArena::new(config.pipeline.op_arena_capacity),
            regs,
            schedulers,
            threads,
            latches: Latches::new(config.pipeline.fetch_width, config.pipeline.rename_width),
            bpred: BranchPredictorWrapper::new(&config.pipeline),
            hit_miss: HitMissPred::new(&config.pipeline),
            caches: Box::new(CacheSystem::new(&config.cache)),
            emulator,
            system,
            hooks,
            stats: CoreStats::default(),
            wheel: TimeWheel::new(config.general.time_wheel_size),
            immediate: VecDeque::new(),
            next_global_serial: 0,
            fetch_thread: 0,
            commit_thread: 0,
            last_commit_cycle: 0,
            cycle: 0,
            phase: Phase::Idle,
            config,
        })
    }

    /// Replaces the data cache model.
    pub fn with_caches(mut self, caches: Box<dyn CacheIf>) -> Self {
        self.set_caches(caches);
        self
    }

    /// Replaces the data cache model in place. Only meaningful before the first cycle.
    pub fn set_caches(&mut self, caches: Box<dyn CacheIf>) {
        self.caches = caches;
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Phase the clock is in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Hardware threads.
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Live ops.
    pub fn ops(&self) -> &OpArena {
        &self.ops
    }

    /// Issue queues.
    pub fn schedulers(&self) -> &[Scheduler] {
        &self.schedulers
    }

    /// Physical register file.
    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    /// Data cache hierarchy.
    pub fn caches(&self) -> &dyn CacheIf {
        self.caches.as_ref()
    }

    /// Load hit/miss predictor.
    pub fn hit_miss(&self) -> &HitMissPred {
        &self.hit_miss
    }

    /// Pipeline counters.
    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }

    /// Instruction semantics provider.
    pub fn emulator(&self) -> &dyn Emulator {
        self.emulator.as_ref()
    }

    /// True once every thread exited and drained.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(Thread::is_finished)
    }

    /// Events waiting on the time wheel or the zero-delay queue.
    pub fn pending_events(&self) -> usize {
        self.wheel.pending() + self.immediate.len()
    }

    /// Next global serial number.
    pub(crate) fn take_global_serial(&mut self) -> u64 {
        let serial = self.next_global_serial;
        self.next_global_serial += 1;
        serial
    }

    /// Schedules `kind` for `op` after `delay` cycles. A zero delay runs right after the
    /// current update.
    pub(crate) fn schedule(&mut self, op: OpHandle, kind: OpEventKind, delay: u64) -> SimResult<()> {
        let event = OpEvent::new(&self.ops[op], kind);
        if delay == 0 {
            self.immediate.push_back(event);
            Ok(())
        } else {
            self.wheel.schedule(event, delay)
        }
    }

    /// Moves `op` to `status`.
    pub(crate) fn set_status(&mut self, op: OpHandle, status: OpStatus) {
        let entry = &mut self.ops[op];
        trace!(op = %op, from = ?entry.status, to = ?status, cycle = self.cycle, "status");
        entry.status = status;
    }

    /// Runs the entry side of `point` for `op`.
    pub(crate) fn hook_enter(&mut self, point: HookPoint, op: OpHandle) {
        self.hooks.enter(point, &self.ops[op]);
    }

    /// Runs the exit side of `point` for `op`.
    pub(crate) fn hook_exit(&mut self, point: HookPoint, op: OpHandle) {
        self.hooks.exit(point, &self.ops[op]);
    }

    /// Scheduler that executes `class`.
    pub(crate) fn scheduler_for(&self, class: OpClass) -> Option<usize> {
        self.schedulers.iter().position(|s| s.handles(class))
    }

    /// Whether an instruction made of `infos` needs a checkpoint before its first op and
    /// after its last op.
    pub(crate) fn checkpoint_needs(&self, infos: &[OpInfo]) -> (bool, bool) {
        if self.config.pipeline.checkpointing == CheckpointingPolicy::All {
            return (true, true);
        }
        let recovery = &self.config.recovery;
        let mut before = false;
        let mut after = false;
        for info in infos {
            let class = info.class;
            after |= class.is_branch();
            for (name, entry) in recovery.entries() {
                if entry.policy != RecoveryPolicy::Refetch {
                    continue;
                }
                let latency = name == "latency";
                let (producer, consumer) = if latency {
                    (class.is_load(), true)
                } else {
                    (class.is_store(), class.is_load())
                };
                match entry.from {
                    RecoveryFrom::Producer => before |= producer,
                    RecoveryFrom::Consumer => before |= consumer,
                    RecoveryFrom::NextOfProducer => after |= producer,
                }
            }
        }
        (before, after)
    }

    fn process_event(&mut self, event: OpEvent) -> SimResult<()> {
        let Some(op) = self.ops.get(event.op) else {
            return Ok(());
        };
        if !event.matches(op) {
            return Ok(());
        }
        let h = event.op;
        match event.kind {
            OpEventKind::WakeUp { target } => {
                self.wakeup(h, target);
                Ok(())
            }
            OpEventKind::Execute => self.execute(h),
            OpEventKind::Finish => self.finish(h),
            OpEventKind::WriteBackBegin => self.writeback_begin(h),
            OpEventKind::WriteBackEnd => {
                self.writeback_end(h);
                Ok(())
            }
            OpEventKind::DetectLatPredMiss => self.detect_latency_miss(h),
            OpEventKind::Retire => self.retire(h),
        }
    }
}

impl EventContext for Core {
    type Event = OpEvent;

    fn take_due_events(&mut self) -> Vec<OpEvent> {
        self.wheel.advance()
    }

    fn take_immediate(&mut self) -> Option<OpEvent> {
        self.immediate.pop_front()
    }

    fn evaluate_event(&self, event: OpEvent) -> Option<Update<Self>> {
        let op = self.ops.get(event.op)?;
        if !event.matches(op) {
            return None;
        }
        Some(Box::new(move |core: &mut Self| core.process_event(event)))
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        if phase == Phase::Idle {
            self.cycle += 1;
        }
    }
}
