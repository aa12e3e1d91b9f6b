//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics of the out-of-order core. It provides:
//! 1. **Throughput:** Cycles, committed and retired instructions, and derived IPC/CPI.
//! 2. **Instruction mix:** Committed ops by op class.
//! 3. **Branch prediction:** Lookups, mispredictions, and accuracy.
//! 4. **Recovery:** Invocations and affected ops per recovery class, flushes and reschedules.
//! 5. **Memory:** Load accesses, store-to-load forwarding, memory dependence and hit/miss
//!    prediction, and cache hit/miss counts per level.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::Core;
use crate::core::recoverer::RecoveryStats;
use crate::core::units::lsu::{HitMissStats, MemDepStats, MemOrderStats};

/// Counters maintained by the core while it runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoreStats {
    /// Ops allocated by fetch, including wrong-path ops.
    pub fetched_ops: u64,
    /// Instructions whose last op committed.
    pub committed_insts: u64,
    /// Ops committed.
    pub committed_ops: u64,
    /// Instructions whose last op retired.
    pub retired_insts: u64,
    /// Ops retired.
    pub retired_ops: u64,
    /// Ops squashed by recovery or thread termination.
    pub flushed_ops: u64,
    /// Ops returned to a scheduler by recovery.
    pub rescheduled_ops: u64,
    /// Control transfers predicted at fetch.
    pub branch_lookups: u64,
    /// Control transfers that resolved against their prediction.
    pub branch_mispredictions: u64,
    /// Load executions that accessed the data cache.
    pub load_accesses: u64,
    /// Committed ops per op class.
    pub inst_mix: BTreeMap<&'static str, u64>,
}

/// Hit and miss counts of one cache level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheLevelStats {
    /// Level name.
    pub name: &'static str,
    /// Hits.
    pub hits: u64,
    /// Misses.
    pub misses: u64,
}

/// Snapshot of every statistic of a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimStats {
    /// Host wall-clock time spent simulating.
    pub host_seconds: f64,
    /// Simulated cycles.
    pub cycles: u64,
    /// Pipeline counters.
    pub core: CoreStats,
    /// Recovery counters summed over threads.
    pub recovery: RecoveryStats,
    /// Memory-order counters summed over threads.
    pub mem_order: MemOrderStats,
    /// Memory dependence predictor counters summed over threads.
    pub mem_dep: MemDepStats,
    /// Load hit/miss predictor counters.
    pub hit_miss: HitMissStats,
    /// Cache levels from L1 down.
    pub caches: Vec<CacheLevelStats>,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"core"`, `"instruction_mix"`, `"branch"`,
/// `"recovery"`, `"memory"`. Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &[
    "summary",
    "core",
    "instruction_mix",
    "branch",
    "recovery",
    "memory",
];

impl SimStats {
    /// Collects the statistics of `core`.
    ///
    /// # Arguments
    ///
    /// * `core` - The simulated core.
    /// * `host_seconds` - Wall-clock time spent so far.
    pub fn collect(core: &Core, host_seconds: f64) -> Self {
        let mut recovery = RecoveryStats::default();
        let mut mem_order = MemOrderStats::default();
        let mut mem_dep = MemDepStats::default();
        for thread in core.threads() {
            recovery.merge(&thread.recovery);
            let m = thread.mem_order.stats();
            mem_order.executed_loads += m.executed_loads;
            mem_order.executed_forwardings += m.executed_forwardings;
            mem_order.retired_loads += m.retired_loads;
            mem_order.retired_forwardings += m.retired_forwardings;
            let d = thread.mem_dep.stats();
            mem_dep.conflicts += d.conflicts;
            mem_dep.dependences += d.dependences;
        }
        let mut caches = Vec::new();
        let mut level = core.caches().first_level();
        while let Some(cache) = level {
            caches.push(CacheLevelStats {
                name: cache.name(),
                hits: cache.hits(),
                misses: cache.misses(),
            });
            level = cache.next_cache();
        }
        Self {
            host_seconds,
            cycles: core.cycle(),
            core: core.stats().clone(),
            recovery,
            mem_order,
            mem_dep,
            hit_miss: core.hit_miss().stats(),
            caches,
        }
    }

    /// Instructions per cycle.
    pub fn ipc(&self) -> f64 {
        self.core.retired_insts as f64 / self.cycles.max(1) as f64
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of `STATS_SECTIONS`. Pass an empty slice to
    /// print all sections (same as `print()`).
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let cyc = self.cycles.max(1);
        let retired = self.core.retired_insts;
        let instr = retired.max(1);
        let pct = |n: u64, total: u64| (n as f64 / total.max(1) as f64) * 100.0;

        if want("summary") {
            let seconds = self.host_seconds.max(f64::EPSILON);
            println!("\n==========================================================");
            println!("OUT-OF-ORDER CORE SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {:.4} s", self.host_seconds);
            println!("sim_cycles               {}", self.cycles);
            println!(
                "sim_freq                 {:.2} kHz",
                (self.cycles as f64 / seconds) / 1000.0
            );
            println!("sim_insts                {retired}");
            println!("sim_ipc                  {:.4}", self.ipc());
            println!("sim_cpi                  {:.4}", cyc as f64 / instr as f64);
            println!("----------------------------------------------------------");
        }
        if want("core") {
            let c = &self.core;
            println!("CORE BREAKDOWN");
            println!("  ops.fetched            {}", c.fetched_ops);
            println!("  ops.committed          {}", c.committed_ops);
            println!("  ops.retired            {}", c.retired_ops);
            println!(
                "  ops.flushed            {} ({:.2}% of fetched)",
                c.flushed_ops,
                pct(c.flushed_ops, c.fetched_ops)
            );
            println!("  ops.rescheduled        {}", c.rescheduled_ops);
            println!("  insts.committed        {}", c.committed_insts);
            println!("----------------------------------------------------------");
        }
        if want("instruction_mix") {
            println!("INSTRUCTION MIX");
            let total = self.core.committed_ops;
            for (class, &count) in &self.core.inst_mix {
                println!(
                    "  op.{:<19} {} ({:.2}%)",
                    class,
                    count,
                    pct(count, total)
                );
            }
            println!("----------------------------------------------------------");
        }
        if want("branch") {
            let lookups = self.core.branch_lookups;
            let miss = self.core.branch_mispredictions;
            let acc = if lookups > 0 {
                100.0 * (lookups.saturating_sub(miss) as f64 / lookups as f64)
            } else {
                0.0
            };
            println!("BRANCH PREDICTION");
            println!("  bp.lookups             {lookups}");
            println!("  bp.mispredicts         {miss}");
            println!("  bp.accuracy            {acc:.2}%");
            println!("----------------------------------------------------------");
        }
        if want("recovery") {
            println!("RECOVERY");
            for (name, counter) in self.recovery.rows() {
                println!(
                    "  {:<22} count: {:<10} | ops: {}",
                    name, counter.count, counter.ops
                );
            }
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            let m = &self.mem_order;
            println!("MEMORY");
            println!("  loads.accesses         {}", self.core.load_accesses);
            println!(
                "  forwarding.executed    {} ({:.2}% of executed loads)",
                m.executed_forwardings,
                pct(m.executed_forwardings, m.executed_loads)
            );
            println!(
                "  forwarding.retired     {} ({:.2}% of retired loads)",
                m.retired_forwardings,
                pct(m.retired_forwardings, m.retired_loads)
            );
            println!("  memdep.conflicts       {}", self.mem_dep.conflicts);
            println!("  memdep.dependences     {}", self.mem_dep.dependences);
            println!("  hitmiss.pred_misses    {}", self.hit_miss.predicted_misses);
            println!("  hitmiss.mispredicts    {}", self.hit_miss.mispredictions);
            for level in &self.caches {
                let total = level.hits + level.misses;
                println!(
                    "  {:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                    level.name,
                    total,
                    level.hits,
                    pct(level.misses, total)
                );
            }
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
