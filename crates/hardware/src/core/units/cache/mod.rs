//! Set-associative data cache model.
//!
//! This module models the timing of data accesses. It provides:
//! 1. **Levels:** `Cache`, one set-associative level with a replacement policy and an
//!    optional next level.
//! 2. **Hierarchy:** `CacheSystem`, the L1 data cache chain backed by fixed-latency memory,
//!    with an outstanding-miss limit.
//! 3. **Contract:** `CacheIf`, the interface the core consumes.
//!
//! Only tags are modeled. Data always comes from the emulator's memory image.

/// Cache replacement policy implementations (LRU, FIFO).
pub mod policies;

use self::policies::ReplacementPolicy;
use crate::common::MemAccess;
use crate::config::{CacheConfig, CacheHierarchyConfig};

/// Cache line entry containing tag and validity.
#[derive(Clone, Copy, Debug, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    /// Cycle at which an in-flight fill completes.
    ready_at: u64,
}

/// Where an access was serviced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLevel {
    /// First-level data cache.
    L1,
    /// Second-level cache.
    L2,
    /// Main memory.
    Memory,
}

/// Timing result of one cache access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheAccessResult {
    /// Cycles until the data is available.
    pub latency: u64,
    /// True if the first level hit.
    pub hit: bool,
    /// The level that supplied the line.
    pub level: CacheLevel,
}

/// Cache collaborator consumed by the core.
pub trait CacheIf: std::fmt::Debug {
    /// Times a load at cycle `now`.
    fn read(&mut self, access: &MemAccess, now: u64) -> CacheAccessResult;

    /// Times a committed store at cycle `now`.
    fn write(&mut self, access: &MemAccess, now: u64) -> CacheAccessResult;

    /// True while no new memory op may be selected.
    fn is_stall_required(&self, now: u64) -> bool;

    /// Hit latency of the first level, used to predict load latency.
    fn static_latency(&self) -> u64;

    /// Latency of a first-level miss served by the next level, used for loads predicted
    /// to miss.
    fn miss_latency(&self) -> u64 {
        self.static_latency()
    }

    /// First cache level, for hierarchy traversal.
    fn first_level(&self) -> Option<&Cache>;
}

/// One cache level.
#[derive(Debug)]
pub struct Cache {
    name: &'static str,
    latency: u64,
    lines: Vec<CacheLine>,
    sets: usize,
    ways: usize,
    line_bytes: usize,
    policy: Box<dyn ReplacementPolicy>,
    next: Option<Box<Cache>>,
    hits: u64,
    misses: u64,
}

impl Cache {
    /// Creates a level from its configuration.
    ///
    /// # Arguments
    ///
    /// * `name` - Level name used in statistics.
    /// * `config` - Geometry, latency and replacement policy. Validated beforehand.
    /// * `next` - Next level, consulted on a miss.
    pub fn new(name: &'static str, config: &CacheConfig, next: Option<Self>) -> Self {
        let ways = config.ways.max(1);
        let line_bytes = config.line_bytes.max(1);
        let sets = (config.size_bytes / (line_bytes * ways)).max(1);
        Self {
            name,
            latency: config.latency,
            lines: vec![CacheLine::default(); sets * ways],
            sets,
            ways,
            line_bytes,
            policy: policies::build(config.policy, sets, ways),
            next: next.map(Box::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Level name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hit latency.
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// Next level in the hierarchy.
    pub fn next_cache(&self) -> Option<&Self> {
        self.next.as_deref()
    }

    /// Hits recorded so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_bytes as u64;
        ((line % self.sets as u64) as usize, line / self.sets as u64)
    }

    /// Returns true if the line holding `addr` is present. Does not touch replacement state.
    pub fn contains(&self, addr: u64) -> bool {
        let (set, tag) = self.locate(addr);
        self.lines[set * self.ways..(set + 1) * self.ways]
            .iter()
            .any(|l| l.valid && l.tag == tag)
    }

    /// Looks up `addr` at cycle `now`, filling the line on a miss.
    ///
    /// A hit on a line whose fill is still in flight waits for the fill to complete.
    ///
    /// # Returns
    ///
    /// The access latency through this level and below, the servicing level, and whether
    /// this level hit.
    pub fn access(&mut self, addr: u64, memory_latency: u64, now: u64) -> (u64, CacheLevel, bool) {
        let (set, tag) = self.locate(addr);
        let base = set * self.ways;
        if let Some(way) = (0..self.ways).find(|&w| {
            let line = self.lines[base + w];
            line.valid && line.tag == tag
        }) {
            self.policy.touch(set, way);
            self.hits += 1;
            let pending = self.lines[base + way].ready_at.saturating_sub(now);
            return (self.latency.max(pending), self.level(), true);
        }

        self.misses += 1;
        let (below, level) = match self.next.as_deref_mut() {
            Some(next) => {
                let (lat, level, _) = next.access(addr, memory_latency, now);
                (lat, level)
            }
            None => (memory_latency, CacheLevel::Memory),
        };
        let way = (0..self.ways)
            .find(|&w| !self.lines[base + w].valid)
            .unwrap_or_else(|| self.policy.victim(set));
        let latency = self.latency + below;
        self.lines[base + way] = CacheLine {
            tag,
            valid: true,
            ready_at: now + latency,
        };
        self.policy.fill(set, way);
        (latency, level, false)
    }

    fn level(&self) -> CacheLevel {
        if self.name == "L1D" {
            CacheLevel::L1
        } else {
            CacheLevel::L2
        }
    }
}

/// The data cache hierarchy seen by the core.
#[derive(Debug)]
pub struct CacheSystem {
    l1: Option<Cache>,
    static_latency: u64,
    miss_latency: u64,
    memory_latency: u64,
    max_outstanding: usize,
    /// Completion cycles of outstanding L1 misses.
    outstanding: Vec<u64>,
}

impl CacheSystem {
    /// Builds the hierarchy from its configuration.
    pub fn new(config: &CacheHierarchyConfig) -> Self {
        let l2 = config
            .l2
            .enabled
            .then(|| Cache::new("L2", &config.l2, None));
        let l1 = config
            .l1_d
            .enabled
            .then(|| Cache::new("L1D", &config.l1_d, l2));
        let next_latency = if config.l2.enabled {
            config.l2.latency
        } else {
            config.memory_latency
        };
        let miss_latency = if config.l1_d.enabled {
            config.l1_d.latency + next_latency
        } else {
            config.l1_d.latency
        };
        Self {
            l1,
            static_latency: config.l1_d.latency,
            miss_latency,
            memory_latency: config.memory_latency,
            max_outstanding: config.max_outstanding_misses,
            outstanding: Vec::new(),
        }
    }

    fn access(&mut self, access: &MemAccess, now: u64) -> CacheAccessResult {
        let Some(l1) = self.l1.as_mut() else {
            return CacheAccessResult {
                latency: self.static_latency,
                hit: true,
                level: CacheLevel::L1,
            };
        };
        let (latency, level, hit) = l1.access(access.address, self.memory_latency, now);
        if !hit {
            self.outstanding.retain(|&done| done > now);
            self.outstanding.push(now + latency);
        }
        CacheAccessResult {
            latency,
            hit,
            level,
        }
    }

    /// Hits and misses per level, from L1 down.
    pub fn level_stats(&self) -> Vec<(&'static str, u64, u64)> {
        let mut out = Vec::new();
        let mut level = self.l1.as_ref();
        while let Some(cache) = level {
            out.push((cache.name(), cache.hits(), cache.misses()));
            level = cache.next_cache();
        }
        out
    }
}

impl CacheIf for CacheSystem {
    fn read(&mut self, access: &MemAccess, now: u64) -> CacheAccessResult {
        self.access(access, now)
    }

    fn write(&mut self, access: &MemAccess, now: u64) -> CacheAccessResult {
        self.access(access, now)
    }

    fn is_stall_required(&self, now: u64) -> bool {
        self.outstanding.iter().filter(|&&done| done > now).count() >= self.max_outstanding
    }

    fn static_latency(&self) -> u64 {
        self.static_latency
    }

    fn miss_latency(&self) -> u64 {
        self.miss_latency
    }

    fn first_level(&self) -> Option<&Cache> {
        self.l1.as_ref()
    }
}
