//! Top-level simulation driver.
//!
//! The simulator owns the core and the clock that drives its stages. It fast-forwards every
//! process through the emulator when configured to, then ticks the clock until every thread
//! exits or a cycle or instruction limit is reached. Any error raised during a cycle is
//! returned tagged with the cycle at which it happened.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::common::{SimError, SimResult};
use crate::config::Config;
use crate::core::Core;
use crate::core::hooks::Hooks;
use crate::core::pipeline::stages::stage_units;
use crate::emu::Emulator;
use crate::sim::clock::Clock;
use crate::sim::system::SystemIf;
use crate::stats::SimStats;

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every thread exited.
    Finished,
    /// `max_cycles` was reached.
    CycleLimit,
    /// `max_insts` was reached.
    InstLimit,
}

/// Outcome of `Simulator::run`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Why the run stopped.
    pub stop: StopReason,
    /// Simulated cycles.
    pub cycles: u64,
    /// Instructions retired.
    pub retired_insts: u64,
    /// Instructions skipped by the emulator before detailed simulation.
    pub skipped_insts: u64,
    /// Exit code of each thread, `None` while it runs or when it ended without one.
    pub exit_codes: Vec<Option<u64>>,
}

/// Core plus the clock that drives it.
#[derive(Debug)]
pub struct Simulator {
    core: Core,
    clock: Clock<Core>,
    skipped_insts: u64,
    host_time: Duration,
}

impl Simulator {
    /// Creates a simulator without hooks.
    ///
    /// # Arguments
    ///
    /// * `config` - Core configuration; validated before anything runs.
    /// * `emulator` - Program semantics. It is fast-forwarded by `general.skip_insts`.
    /// * `system` - Receives process and system call notifications.
    pub fn new(
        config: Config,
        emulator: Box<dyn Emulator>,
        system: Box<dyn SystemIf>,
    ) -> SimResult<Self> {
        Self::with_hooks(config, emulator, system, Hooks::new())
    }

    /// Creates a simulator with extension points registered on the core.
    pub fn with_hooks(
        config: Config,
        mut emulator: Box<dyn Emulator>,
        system: Box<dyn SystemIf>,
        hooks: Hooks,
    ) -> SimResult<Self> {
        config.validate()?;
        let mut skipped_insts = 0;
        let skip = config.general.skip_insts;
        if skip > 0 {
            for pid in 0..emulator.process_count() as u32 {
                let pc = emulator.entry_pc(pid);
                let (next, executed) = emulator.skip(pid, pc, skip)?;
                debug!(pid, from = pc, to = next, executed, "fast-forwarded");
                skipped_insts += executed;
            }
        }

        let core = Core::new(config, emulator, system, hooks)?;
        let mut clock = Clock::new();
        for unit in stage_units() {
            clock.register(unit);
        }
        Ok(Self {
            core,
            clock,
            skipped_insts,
            host_time: Duration::ZERO,
        })
    }

    /// The simulated core.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Mutable access to the core, for installing custom caches or selectors before a run.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Completed cycles.
    pub fn cycle(&self) -> u64 {
        self.core.cycle()
    }

    /// Advances the core by one cycle.
    pub fn tick(&mut self) -> SimResult<()> {
        let start = Instant::now();
        let cycle = self.core.cycle();
        let result = self.clock.tick(&mut self.core);
        self.host_time += start.elapsed();
        result.map_err(|e| e.at_cycle(cycle))
    }

    /// Runs until every thread exits or a configured limit is reached.
    ///
    /// # Returns
    ///
    /// The run summary, or the first fatal error tagged with its cycle.
    pub fn run(&mut self) -> SimResult<RunSummary> {
        let general = &self.core.config().general;
        let (max_cycles, max_insts) = (general.max_cycles, general.max_insts);
        info!(
            threads = self.core.threads().len(),
            skipped = self.skipped_insts,
            max_cycles = ?max_cycles,
            max_insts = ?max_insts,
            "simulation started"
        );

        let stop = loop {
            if self.core.is_finished() {
                break StopReason::Finished;
            }
            if max_cycles.is_some_and(|limit| self.core.cycle() >= limit) {
                break StopReason::CycleLimit;
            }
            if max_insts.is_some_and(|limit| self.core.stats().retired_insts >= limit) {
                break StopReason::InstLimit;
            }
            self.tick()?;
        };

        let summary = self.summary(stop);
        info!(
            stop = ?summary.stop,
            cycles = summary.cycles,
            retired = summary.retired_insts,
            "simulation finished"
        );
        Ok(summary)
    }

    /// Summary of the run so far.
    pub fn summary(&self, stop: StopReason) -> RunSummary {
        RunSummary {
            stop,
            cycles: self.core.cycle(),
            retired_insts: self.core.stats().retired_insts,
            skipped_insts: self.skipped_insts,
            exit_codes: self.core.threads().iter().map(|t| t.exit_code).collect(),
        }
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> SimStats {
        SimStats::collect(&self.core, self.host_time.as_secs_f64())
    }

    /// Checks that the pipeline drained cleanly after every thread finished.
    pub fn verify_drained(&self) -> SimResult<()> {
        let live = self.core.ops().len();
        if live != 0 {
            return Err(SimError::invariant(format!(
                "{live} ops still live after every thread finished"
            )));
        }
        Ok(())
    }
}
