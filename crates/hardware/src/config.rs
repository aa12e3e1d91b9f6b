//! Configuration system for the out-of-order core simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline widths, capacities, latencies and cache geometry.
//! 2. **Structures:** Hierarchical config for general, pipeline, schedulers, memory, cache and
//!    recovery settings.
//! 3. **Enums:** Checkpointing, commit point, scheduler remove policy, the branch, memory
//!    dependence and hit/miss predictors, replacement policy and data-misprediction recovery.
//! 4. **Validation:** `Config::validate` rejects inconsistent configurations before any
//!    component is built.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_file`) or built from
//! `Config::default()`.

use std::path::Path;

use serde::Deserialize;

use crate::common::{Endian, SimError, SimResult};
use crate::emu::OpClass;

/// Default configuration constants for the simulator.
mod defaults {
    /// Time wheel slot count. Bounds the longest deferred event.
    pub const TIME_WHEEL_SIZE: usize = 512;

    /// Cycles without a commit before the run is declared deadlocked.
    pub const NO_COMMIT_LIMIT: u64 = 10_000;

    /// Fetch, rename, dispatch and commit width.
    pub const WIDTH: usize = 4;

    /// In-flight ops per thread (reorder window).
    pub const INORDER_LIST_CAPACITY: usize = 128;

    /// Op arena slots shared by all threads.
    pub const OP_ARENA_CAPACITY: usize = 512;

    /// Physical registers shared by all threads.
    pub const PHYSICAL_REGISTERS: usize = 256;

    /// Live checkpoints per thread.
    pub const CHECKPOINT_CAPACITY: usize = 64;

    /// Cycles from commit to retirement.
    pub const COMMIT_LATENCY: u64 = 1;

    /// Cycles from the start of write-back until results are written back.
    pub const WRITEBACK_LATENCY: u64 = 1;

    /// Branch target buffer entries.
    pub const BTB_SIZE: usize = 512;

    /// Gshare global history bits.
    pub const GSHARE_HISTORY_BITS: usize = 12;

    /// Return address stack entries.
    pub const RAS_SIZE: usize = 16;

    /// Hit/miss predictor table index bits.
    pub const HIT_MISS_TABLE_BITS: usize = 10;

    /// Store set table index bits.
    pub const STORE_SET_TABLE_BITS: usize = 10;

    /// Per-scheduler issue width.
    pub const ISSUE_WIDTH: usize = 2;

    /// Per-scheduler window capacity.
    pub const WINDOW_CAPACITY: usize = 32;

    /// Cycles from select to execution.
    pub const ISSUE_LATENCY: u64 = 1;

    /// Load queue entries.
    pub const LOAD_QUEUE_CAPACITY: usize = 32;

    /// Store queue entries.
    pub const STORE_QUEUE_CAPACITY: usize = 32;

    /// L1 data cache size in bytes (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;

    /// L2 cache size in bytes (256 KiB).
    pub const L2_SIZE: usize = 256 * 1024;

    /// Cache line size in bytes.
    pub const CACHE_LINE: usize = 64;

    /// L1 associativity.
    pub const L1_WAYS: usize = 4;

    /// L2 associativity.
    pub const L2_WAYS: usize = 8;

    /// L1 hit latency in cycles.
    pub const L1_LATENCY: u64 = 1;

    /// L2 hit latency in cycles.
    pub const L2_LATENCY: u64 = 10;

    /// Main memory latency in cycles.
    pub const MEMORY_LATENCY: u64 = 100;

    /// Outstanding L1 misses before memory ops stop being selected.
    pub const MAX_OUTSTANDING_MISSES: usize = 8;
}

/// When fetch and rename take checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CheckpointingPolicy {
    /// Every op takes before and after checkpoints.
    All,
    /// Checkpoints are taken only where a configured recovery may need them.
    #[default]
    Auto,
}

/// Status an op must reach before it may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CommitPoint {
    /// Commit as soon as execution finishes.
    Finished,
    /// Commit once write-back completes.
    #[default]
    WrittenBack,
}

/// Which issued ops still occupy a scheduler window slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RemovePolicy {
    /// Issued ops keep their slot until commit. Every recovery policy works.
    #[default]
    Retain,
    /// Ops leave the window when issued. Only refetch can recover them.
    Remove,
    /// Ops leave the window when they finish.
    RemoveAfterFinish,
}

/// Branch predictor implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BranchPredictor {
    /// Always predict not-taken.
    #[default]
    StaticNotTaken,
    /// Always predict taken when a target is known.
    StaticTaken,
    /// Global history XOR PC indexed two-bit counters.
    GShare,
}

/// Memory dependence predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemDepPredictor {
    /// Loads never wait for stores; violations are recovered.
    #[default]
    Optimistic,
    /// Loads wait for every older store to execute.
    Conservative,
    /// Loads wait for the last store of their learned store set.
    StoreSet,
}

/// Load hit/miss predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HitMissPredictor {
    /// Every load is predicted to hit the first level.
    #[default]
    AlwaysHit,
    /// Per-PC saturating counters trained by each load's outcome.
    Counter,
}

/// Cache replacement policy algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Evicts the line accessed least recently.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Evicts the line installed earliest.
    #[serde(alias = "Fifo")]
    Fifo,
}

/// Where a data-misprediction recovery starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RecoveryFrom {
    /// The producing op itself.
    Producer,
    /// The op after the producer in program order.
    NextOfProducer,
    /// The consuming op.
    Consumer,
}

/// How a data-misprediction recovery re-executes ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RecoveryPolicy {
    /// Flush from the start op and fetch again.
    Refetch,
    /// Reschedule every op from the start op.
    ReissueAll,
    /// Reschedule every op from the start op that has not finished. Only valid for
    /// latency recovery, where the producer itself has not finished.
    ReissueNotFinished,
    /// Reschedule only the transitive consumers of the producer.
    ReissueSelective,
}

/// Recovery configuration for one data-misprediction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DataRecoveryConfig {
    /// Recovery start point.
    pub from: RecoveryFrom,
    /// Recovery mechanism.
    pub policy: RecoveryPolicy,
}

impl DataRecoveryConfig {
    /// Creates a recovery configuration.
    pub const fn new(from: RecoveryFrom, policy: RecoveryPolicy) -> Self {
        Self { from, policy }
    }
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use o3sim_core::config::{BranchPredictor, Config, RecoveryPolicy};
///
/// let json = r#"{
///     "pipeline": { "fetch_width": 2, "branch_predictor": "GShare" },
///     "recovery": { "latency": { "from": "Producer", "policy": "ReissueAll" } }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.pipeline.fetch_width, 2);
/// assert_eq!(config.pipeline.branch_predictor, BranchPredictor::GShare);
/// assert_eq!(config.recovery.latency.policy, RecoveryPolicy::ReissueAll);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Run limits and engine sizing.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Front-end and commit widths, capacities and policies.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Issue queues and their execution units.
    #[serde(default = "Config::default_schedulers")]
    pub schedulers: Vec<SchedulerConfig>,
    /// Load/store queue configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Data cache hierarchy.
    #[serde(default)]
    pub cache: CacheHierarchyConfig,
    /// Misprediction recovery configuration.
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            pipeline: PipelineConfig::default(),
            schedulers: Self::default_schedulers(),
            memory: MemoryConfig::default(),
            cache: CacheHierarchyConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Stop after this many cycles.
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Stop after this many retired instructions.
    #[serde(default)]
    pub max_insts: Option<u64>,

    /// Instructions per process to fast-forward functionally before detailed simulation.
    #[serde(default)]
    pub skip_insts: u64,

    /// Time wheel slot count.
    #[serde(default = "GeneralConfig::default_time_wheel_size")]
    pub time_wheel_size: usize,

    /// Cycles without any commit before the run aborts as deadlocked.
    #[serde(default = "GeneralConfig::default_no_commit_limit")]
    pub no_commit_limit: u64,
}

impl GeneralConfig {
    fn default_time_wheel_size() -> usize {
        defaults::TIME_WHEEL_SIZE
    }

    fn default_no_commit_limit() -> u64 {
        defaults::NO_COMMIT_LIMIT
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            max_insts: None,
            skip_insts: 0,
            time_wheel_size: defaults::TIME_WHEEL_SIZE,
            no_commit_limit: defaults::NO_COMMIT_LIMIT,
        }
    }
}

/// Pipeline widths, capacities and policies.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Ops fetched per cycle.
    #[serde(default = "PipelineConfig::default_width")]
    pub fetch_width: usize,

    /// Ops renamed per cycle.
    #[serde(default = "PipelineConfig::default_width")]
    pub rename_width: usize,

    /// Ops dispatched per cycle.
    #[serde(default = "PipelineConfig::default_width")]
    pub dispatch_width: usize,

    /// Ops committed per cycle.
    #[serde(default = "PipelineConfig::default_width")]
    pub commit_width: usize,

    /// In-flight ops per thread.
    #[serde(default = "PipelineConfig::default_inorder_list_capacity")]
    pub inorder_list_capacity: usize,

    /// Op arena slots.
    #[serde(default = "PipelineConfig::default_op_arena_capacity")]
    pub op_arena_capacity: usize,

    /// Physical registers.
    #[serde(default = "PipelineConfig::default_physical_registers")]
    pub physical_registers: usize,

    /// Live checkpoints per thread.
    #[serde(default = "PipelineConfig::default_checkpoint_capacity")]
    pub checkpoint_capacity: usize,

    /// Checkpoint creation policy.
    #[serde(default)]
    pub checkpointing: CheckpointingPolicy,

    /// Branch predictor type.
    #[serde(default)]
    pub branch_predictor: BranchPredictor,

    /// Branch target buffer entries.
    #[serde(default = "PipelineConfig::default_btb_size")]
    pub btb_size: usize,

    /// Gshare global history bits.
    #[serde(default = "PipelineConfig::default_gshare_history_bits")]
    pub gshare_history_bits: usize,

    /// Return address stack entries. Zero disables return prediction.
    #[serde(default = "PipelineConfig::default_ras_size")]
    pub ras_size: usize,

    /// Load hit/miss predictor type.
    #[serde(default)]
    pub hit_miss_predictor: HitMissPredictor,

    /// Hit/miss predictor table index bits.
    #[serde(default = "PipelineConfig::default_hit_miss_table_bits")]
    pub hit_miss_table_bits: usize,

    /// Cycles from commit to retirement.
    #[serde(default = "PipelineConfig::default_commit_latency")]
    pub commit_latency: u64,

    /// Cycles from the start of write-back until results are written back.
    #[serde(default = "PipelineConfig::default_writeback_latency")]
    pub writeback_latency: u64,

    /// Status required before commit.
    #[serde(default)]
    pub commit_point: CommitPoint,

    /// Remove policy of schedulers that do not set their own.
    #[serde(default)]
    pub remove_policy: RemovePolicy,
}

impl PipelineConfig {
    fn default_width() -> usize {
        defaults::WIDTH
    }

    fn default_inorder_list_capacity() -> usize {
        defaults::INORDER_LIST_CAPACITY
    }

    fn default_op_arena_capacity() -> usize {
        defaults::OP_ARENA_CAPACITY
    }

    fn default_physical_registers() -> usize {
        defaults::PHYSICAL_REGISTERS
    }

    fn default_checkpoint_capacity() -> usize {
        defaults::CHECKPOINT_CAPACITY
    }

    fn default_btb_size() -> usize {
        defaults::BTB_SIZE
    }

    fn default_gshare_history_bits() -> usize {
        defaults::GSHARE_HISTORY_BITS
    }

    fn default_ras_size() -> usize {
        defaults::RAS_SIZE
    }

    fn default_hit_miss_table_bits() -> usize {
        defaults::HIT_MISS_TABLE_BITS
    }

    fn default_commit_latency() -> u64 {
        defaults::COMMIT_LATENCY
    }

    fn default_writeback_latency() -> u64 {
        defaults::WRITEBACK_LATENCY
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::WIDTH,
            rename_width: defaults::WIDTH,
            dispatch_width: defaults::WIDTH,
            commit_width: defaults::WIDTH,
            inorder_list_capacity: defaults::INORDER_LIST_CAPACITY,
            op_arena_capacity: defaults::OP_ARENA_CAPACITY,
            physical_registers: defaults::PHYSICAL_REGISTERS,
            checkpoint_capacity: defaults::CHECKPOINT_CAPACITY,
            checkpointing: CheckpointingPolicy::default(),
            branch_predictor: BranchPredictor::default(),
            btb_size: defaults::BTB_SIZE,
            gshare_history_bits: defaults::GSHARE_HISTORY_BITS,
            ras_size: defaults::RAS_SIZE,
            hit_miss_predictor: HitMissPredictor::default(),
            hit_miss_table_bits: defaults::HIT_MISS_TABLE_BITS,
            commit_latency: defaults::COMMIT_LATENCY,
            writeback_latency: defaults::WRITEBACK_LATENCY,
            commit_point: CommitPoint::default(),
            remove_policy: RemovePolicy::default(),
        }
    }
}

/// One issue queue.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Name used in diagnostics and statistics.
    pub name: String,

    /// Ops selected per cycle.
    #[serde(default = "SchedulerConfig::default_issue_width")]
    pub issue_width: usize,

    /// Entries in the window.
    #[serde(default = "SchedulerConfig::default_window_capacity")]
    pub window_capacity: usize,

    /// Cycles from select to execution.
    #[serde(default = "SchedulerConfig::default_issue_latency")]
    pub issue_latency: u64,

    /// Extra wake-up latency to each scheduler, indexed by scheduler. `-1` means results
    /// never wake that scheduler. Empty means zero for every scheduler.
    #[serde(default)]
    pub communication_latencies: Vec<i64>,

    /// Overrides the pipeline-wide remove policy.
    #[serde(default)]
    pub remove_policy: Option<RemovePolicy>,

    /// Execution units fed by this scheduler.
    pub units: Vec<ExecUnitConfig>,
}

impl SchedulerConfig {
    fn default_issue_width() -> usize {
        defaults::ISSUE_WIDTH
    }

    fn default_window_capacity() -> usize {
        defaults::WINDOW_CAPACITY
    }

    fn default_issue_latency() -> u64 {
        defaults::ISSUE_LATENCY
    }

    /// Returns true if one of this scheduler's units executes `class`.
    pub fn handles(&self, class: OpClass) -> bool {
        self.units.iter().any(|u| u.classes.contains(&class))
    }

    /// Communication latency to scheduler `target`, or `None` if results never reach it.
    pub fn communication_latency(&self, target: usize) -> Option<u64> {
        match self.communication_latencies.get(target) {
            None => Some(0),
            Some(&lat) if lat < 0 => None,
            Some(&lat) => Some(lat as u64),
        }
    }
}

/// A group of identical execution units.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecUnitConfig {
    /// Op classes the units execute.
    pub classes: Vec<OpClass>,

    /// Number of units.
    #[serde(default = "ExecUnitConfig::default_count")]
    pub count: usize,

    /// Execution latency in cycles.
    #[serde(default = "ExecUnitConfig::default_latency")]
    pub latency: u64,

    /// Pipelined units accept a new op every cycle; others stay busy for `latency` cycles.
    #[serde(default = "ExecUnitConfig::default_pipelined")]
    pub pipelined: bool,
}

impl ExecUnitConfig {
    fn default_count() -> usize {
        1
    }

    fn default_latency() -> u64 {
        1
    }

    fn default_pipelined() -> bool {
        true
    }

    /// Creates a pipelined unit group.
    pub fn new(classes: &[OpClass], count: usize, latency: u64) -> Self {
        Self {
            classes: classes.to_vec(),
            count,
            latency,
            pipelined: true,
        }
    }
}

impl Config {
    /// Default issue queues: an integer queue and a memory queue.
    fn default_schedulers() -> Vec<SchedulerConfig> {
        let int = SchedulerConfig {
            name: "int".to_string(),
            issue_width: defaults::ISSUE_WIDTH,
            window_capacity: defaults::WINDOW_CAPACITY,
            issue_latency: defaults::ISSUE_LATENCY,
            communication_latencies: Vec::new(),
            remove_policy: None,
            units: vec![
                ExecUnitConfig::new(&[OpClass::IntAlu, OpClass::Branch, OpClass::Jump], 2, 1),
                ExecUnitConfig::new(&[OpClass::IntMul], 1, 3),
                ExecUnitConfig {
                    pipelined: false,
                    ..ExecUnitConfig::new(&[OpClass::IntDiv], 1, 12)
                },
            ],
        };
        let mem = SchedulerConfig {
            name: "mem".to_string(),
            issue_width: defaults::ISSUE_WIDTH,
            window_capacity: defaults::WINDOW_CAPACITY,
            issue_latency: defaults::ISSUE_LATENCY,
            communication_latencies: Vec::new(),
            remove_policy: None,
            units: vec![ExecUnitConfig::new(&[OpClass::Load, OpClass::Store], 2, 1)],
        };
        vec![int, mem]
    }
}

/// Load/store queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Shared load/store queue capacity. Overrides the split capacities when set.
    #[serde(default)]
    pub unified_capacity: Option<usize>,

    /// Load queue entries.
    #[serde(default = "MemoryConfig::default_load_queue")]
    pub load_queue_capacity: usize,

    /// Store queue entries.
    #[serde(default = "MemoryConfig::default_store_queue")]
    pub store_queue_capacity: usize,

    /// Reconstruct partially overlapping loads instead of flagging them.
    #[serde(default)]
    pub ideal_partial_load: bool,

    /// Drop queue entries at commit rather than at retirement.
    #[serde(default)]
    pub remove_ops_on_commit: bool,

    /// Target byte order of the memory image.
    #[serde(default)]
    pub endian: Endian,

    /// Memory dependence predictor type.
    #[serde(default)]
    pub dependence_predictor: MemDepPredictor,

    /// Store set table index bits.
    #[serde(default = "MemoryConfig::default_store_set_table_bits")]
    pub store_set_table_bits: usize,
}

impl MemoryConfig {
    fn default_load_queue() -> usize {
        defaults::LOAD_QUEUE_CAPACITY
    }

    fn default_store_queue() -> usize {
        defaults::STORE_QUEUE_CAPACITY
    }

    fn default_store_set_table_bits() -> usize {
        defaults::STORE_SET_TABLE_BITS
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            unified_capacity: None,
            load_queue_capacity: defaults::LOAD_QUEUE_CAPACITY,
            store_queue_capacity: defaults::STORE_QUEUE_CAPACITY,
            ideal_partial_load: false,
            remove_ops_on_commit: false,
            endian: Endian::default(),
            dependence_predictor: MemDepPredictor::default(),
            store_set_table_bits: defaults::STORE_SET_TABLE_BITS,
        }
    }
}

/// Data cache hierarchy.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheHierarchyConfig {
    /// L1 data cache.
    #[serde(default = "CacheConfig::default_l1")]
    pub l1_d: CacheConfig,

    /// Unified L2 cache.
    #[serde(default = "CacheConfig::default_l2")]
    pub l2: CacheConfig,

    /// Main memory latency in cycles.
    #[serde(default = "CacheHierarchyConfig::default_memory_latency")]
    pub memory_latency: u64,

    /// Outstanding L1 misses before memory ops stop being selected.
    #[serde(default = "CacheHierarchyConfig::default_max_outstanding")]
    pub max_outstanding_misses: usize,
}

impl CacheHierarchyConfig {
    fn default_memory_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    fn default_max_outstanding() -> usize {
        defaults::MAX_OUTSTANDING_MISSES
    }

    /// Longest possible data access, from L1 lookup to memory.
    pub fn worst_case_latency(&self) -> u64 {
        let mut total = self.l1_d.latency + self.memory_latency;
        if self.l2.enabled {
            total += self.l2.latency;
        }
        total
    }
}

impl Default for CacheHierarchyConfig {
    fn default() -> Self {
        Self {
            l1_d: CacheConfig::default_l1(),
            l2: CacheConfig::default_l2(),
            memory_latency: defaults::MEMORY_LATENCY,
            max_outstanding_misses: defaults::MAX_OUTSTANDING_MISSES,
        }
    }
}

/// Individual cache level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enable this cache level. A disabled L1 behaves as an always-hit cache.
    #[serde(default = "CacheConfig::default_enabled")]
    pub enabled: bool,

    /// Total cache size in bytes.
    pub size_bytes: usize,

    /// Cache line size in bytes.
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity (number of ways).
    pub ways: usize,

    /// Replacement policy.
    #[serde(default)]
    pub policy: ReplacementPolicy,

    /// Hit latency in cycles.
    pub latency: u64,
}

impl CacheConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    fn default_l1() -> Self {
        Self {
            enabled: true,
            size_bytes: defaults::L1_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::L1_WAYS,
            policy: ReplacementPolicy::Lru,
            latency: defaults::L1_LATENCY,
        }
    }

    fn default_l2() -> Self {
        Self {
            enabled: true,
            size_bytes: defaults::L2_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::L2_WAYS,
            policy: ReplacementPolicy::Lru,
            latency: defaults::L2_LATENCY,
        }
    }

    fn validate(&self, name: &str) -> SimResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.line_bytes == 0 || !self.line_bytes.is_power_of_two() {
            return Err(SimError::config(format!(
                "{name}: line size {} must be a non-zero power of two",
                self.line_bytes
            )));
        }
        if self.ways == 0 || self.size_bytes < self.line_bytes * self.ways {
            return Err(SimError::config(format!(
                "{name}: {} bytes cannot hold {} ways of {}-byte lines",
                self.size_bytes, self.ways, self.line_bytes
            )));
        }
        let sets = self.size_bytes / (self.line_bytes * self.ways);
        if !sets.is_power_of_two() || sets * self.line_bytes * self.ways != self.size_bytes {
            return Err(SimError::config(format!(
                "{name}: set count must be a power of two"
            )));
        }
        Ok(())
    }
}

/// Misprediction recovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    /// Load latency misprediction.
    #[serde(default = "RecoveryConfig::default_latency")]
    pub latency: DataRecoveryConfig,

    /// Store/load address match (access-order violation).
    #[serde(default = "RecoveryConfig::default_address_match")]
    pub address_match: DataRecoveryConfig,

    /// Value misprediction.
    #[serde(default = "RecoveryConfig::default_value")]
    pub value: DataRecoveryConfig,

    /// Partially forwarded load.
    #[serde(default = "RecoveryConfig::default_partial_load")]
    pub partial_load: DataRecoveryConfig,

    /// Fetch stall after a branch misprediction recovery.
    #[serde(default)]
    pub bpred_recovery_latency: u64,

    /// Fetch stall after an exception recovery.
    #[serde(default)]
    pub exception_recovery_latency: u64,
}

impl RecoveryConfig {
    fn default_latency() -> DataRecoveryConfig {
        DataRecoveryConfig::new(RecoveryFrom::Producer, RecoveryPolicy::ReissueSelective)
    }

    fn default_address_match() -> DataRecoveryConfig {
        DataRecoveryConfig::new(RecoveryFrom::NextOfProducer, RecoveryPolicy::Refetch)
    }

    fn default_value() -> DataRecoveryConfig {
        DataRecoveryConfig::new(RecoveryFrom::NextOfProducer, RecoveryPolicy::Refetch)
    }

    fn default_partial_load() -> DataRecoveryConfig {
        DataRecoveryConfig::new(RecoveryFrom::Consumer, RecoveryPolicy::Refetch)
    }

    /// Every data recovery entry with its name.
    pub fn entries(&self) -> [(&'static str, DataRecoveryConfig); 4] {
        [
            ("latency", self.latency),
            ("address_match", self.address_match),
            ("value", self.value),
            ("partial_load", self.partial_load),
        ]
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            latency: Self::default_latency(),
            address_match: Self::default_address_match(),
            value: Self::default_value(),
            partial_load: Self::default_partial_load(),
            bpred_recovery_latency: 0,
            exception_recovery_latency: 0,
        }
    }
}

/// Op classes that need an execution unit.
const EXECUTED_CLASSES: [OpClass; 7] = [
    OpClass::IntAlu,
    OpClass::IntMul,
    OpClass::IntDiv,
    OpClass::Load,
    OpClass::Store,
    OpClass::Branch,
    OpClass::Jump,
];

impl Config {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::config(e.to_string()))
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Remove policy in effect for scheduler `index`.
    pub fn remove_policy(&self, index: usize) -> RemovePolicy {
        self.schedulers
            .get(index)
            .and_then(|s| s.remove_policy)
            .unwrap_or(self.pipeline.remove_policy)
    }

    /// Longest delay any component may schedule on the time wheel.
    pub fn longest_latency(&self) -> u64 {
        let unit = self
            .schedulers
            .iter()
            .flat_map(|s| s.units.iter().map(move |u| u.latency + s.issue_latency))
            .max()
            .unwrap_or(0);
        let com = self
            .schedulers
            .iter()
            .flat_map(|s| s.communication_latencies.iter().copied())
            .max()
            .unwrap_or(0)
            .max(0) as u64;
        let pipe = &self.pipeline;
        let rec = &self.recovery;
        [
            unit + self.cache.worst_case_latency() + com + 1,
            pipe.commit_latency.max(self.cache.worst_case_latency()),
            pipe.writeback_latency + 1,
            rec.bpred_recovery_latency.max(rec.exception_recovery_latency),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Checks the configuration for consistency.
    ///
    /// # Returns
    ///
    /// `SimError::Config` describing the first problem found.
    pub fn validate(&self) -> SimResult<()> {
        let p = &self.pipeline;
        let nonzero = [
            ("pipeline.fetch_width", p.fetch_width),
            ("pipeline.rename_width", p.rename_width),
            ("pipeline.dispatch_width", p.dispatch_width),
            ("pipeline.commit_width", p.commit_width),
            ("pipeline.inorder_list_capacity", p.inorder_list_capacity),
            ("pipeline.op_arena_capacity", p.op_arena_capacity),
            ("pipeline.btb_size", p.btb_size),
            ("general.time_wheel_size", self.general.time_wheel_size),
            ("cache.max_outstanding_misses", self.cache.max_outstanding_misses),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(SimError::config(format!("{name} must be non-zero")));
            }
        }
        let table_bits = [
            ("pipeline.gshare_history_bits", p.gshare_history_bits),
            ("pipeline.hit_miss_table_bits", p.hit_miss_table_bits),
            ("memory.store_set_table_bits", self.memory.store_set_table_bits),
        ];
        for (name, bits) in table_bits {
            if bits == 0 || bits > 24 {
                return Err(SimError::config(format!("{name} must be in 1..=24")));
            }
        }
        if self.general.no_commit_limit == 0 {
            return Err(SimError::config("general.no_commit_limit must be non-zero"));
        }

        let at_least_fetch = [
            ("pipeline.inorder_list_capacity", p.inorder_list_capacity),
            ("pipeline.op_arena_capacity", p.op_arena_capacity),
        ];
        for (name, value) in at_least_fetch {
            if value < p.fetch_width {
                return Err(SimError::config(format!(
                    "{name} ({value}) is smaller than the fetch width ({})",
                    p.fetch_width
                )));
            }
        }
        if p.checkpoint_capacity < 2 {
            return Err(SimError::config(
                "pipeline.checkpoint_capacity must be at least 2",
            ));
        }

        self.validate_memory()?;
        self.validate_schedulers()?;
        self.cache.l1_d.validate("cache.l1_d")?;
        self.cache.l2.validate("cache.l2")?;
        self.validate_recovery()?;

        let longest = self.longest_latency();
        if self.general.time_wheel_size as u64 <= longest {
            return Err(SimError::config(format!(
                "general.time_wheel_size ({}) must exceed the longest latency ({longest})",
                self.general.time_wheel_size
            )));
        }
        Ok(())
    }

    /// Checks that the physical register file can back every thread's logical registers.
    pub fn validate_registers(&self, logical: usize, threads: usize) -> SimResult<()> {
        let required = logical * threads + self.pipeline.rename_width;
        if self.pipeline.physical_registers < required {
            return Err(SimError::config(format!(
                "pipeline.physical_registers ({}) must be at least {required} \
                 ({logical} logical x {threads} threads + rename width)",
                self.pipeline.physical_registers
            )));
        }
        Ok(())
    }

    fn validate_memory(&self) -> SimResult<()> {
        let m = &self.memory;
        let fetch = self.pipeline.fetch_width;
        let queues: Vec<(&str, usize)> = match m.unified_capacity {
            Some(cap) => vec![("memory.unified_capacity", cap)],
            None => vec![
                ("memory.load_queue_capacity", m.load_queue_capacity),
                ("memory.store_queue_capacity", m.store_queue_capacity),
            ],
        };
        for (name, value) in queues {
            if value < fetch {
                return Err(SimError::config(format!(
                    "{name} ({value}) is smaller than the fetch width ({fetch})"
                )));
            }
        }
        Ok(())
    }

    fn validate_schedulers(&self) -> SimResult<()> {
        if self.schedulers.is_empty() {
            return Err(SimError::config("at least one scheduler is required"));
        }
        let count = self.schedulers.len();
        for s in &self.schedulers {
            if s.issue_width == 0 {
                return Err(SimError::config(format!(
                    "scheduler {}: issue_width must be non-zero",
                    s.name
                )));
            }
            if s.window_capacity < self.pipeline.fetch_width {
                return Err(SimError::config(format!(
                    "scheduler {}: window ({}) is smaller than the fetch width ({})",
                    s.name, s.window_capacity, self.pipeline.fetch_width
                )));
            }
            if !s.communication_latencies.is_empty() && s.communication_latencies.len() != count {
                return Err(SimError::config(format!(
                    "scheduler {}: {} communication latencies for {count} schedulers",
                    s.name,
                    s.communication_latencies.len()
                )));
            }
            if let Some(&bad) = s.communication_latencies.iter().find(|&&l| l < -1) {
                return Err(SimError::config(format!(
                    "scheduler {}: communication latency {bad} is invalid",
                    s.name
                )));
            }
            if s.units.iter().any(|u| u.count == 0 || u.latency == 0) {
                return Err(SimError::config(format!(
                    "scheduler {}: execution units need a non-zero count and latency",
                    s.name
                )));
            }
        }
        for class in EXECUTED_CLASSES {
            let owners = self.schedulers.iter().filter(|s| s.handles(class)).count();
            if owners != 1 {
                return Err(SimError::config(format!(
                    "op class {class:?} is handled by {owners} schedulers; exactly one is required"
                )));
            }
        }
        Ok(())
    }

    fn validate_recovery(&self) -> SimResult<()> {
        for (name, entry) in self.recovery.entries() {
            if entry.policy == RecoveryPolicy::ReissueSelective
                && entry.from == RecoveryFrom::NextOfProducer
            {
                return Err(SimError::config(format!(
                    "recovery.{name}: ReissueSelective cannot start from NextOfProducer"
                )));
            }
            // A violating load has already finished, so skipping finished ops commits its
            // stale value.
            if name != "latency" && entry.policy == RecoveryPolicy::ReissueNotFinished {
                return Err(SimError::config(format!(
                    "recovery.{name}: ReissueNotFinished cannot re-execute the finished op that read stale data"
                )));
            }
        }
        if self.recovery.partial_load.from != RecoveryFrom::Consumer {
            return Err(SimError::config(
                "recovery.partial_load must recover from the Consumer",
            ));
        }
        for index in 0..self.schedulers.len() {
            let remove = self.remove_policy(index);
            for (name, entry) in self.recovery.entries() {
                let allowed = match remove {
                    RemovePolicy::Retain => true,
                    RemovePolicy::Remove => entry.policy == RecoveryPolicy::Refetch,
                    RemovePolicy::RemoveAfterFinish => entry.policy != RecoveryPolicy::ReissueAll,
                };
                if !allowed {
                    return Err(SimError::config(format!(
                        "scheduler {}: remove policy {remove:?} cannot support {:?} recovery for {name}",
                        self.schedulers[index].name, entry.policy
                    )));
                }
            }
        }
        Ok(())
    }
}
