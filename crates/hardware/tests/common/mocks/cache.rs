use o3sim_core::common::MemAccess;
use o3sim_core::core::units::cache::{Cache, CacheAccessResult, CacheIf, CacheLevel};

/// Cache that answers every access after a fixed latency and never stalls.
#[derive(Debug, Default)]
pub struct FixedLatencyCache {
    pub latency: u64,
    pub reads: u64,
    pub writes: u64,
}

impl FixedLatencyCache {
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn answer(&self) -> CacheAccessResult {
        CacheAccessResult {
            latency: self.latency,
            hit: true,
            level: CacheLevel::L1,
        }
    }
}

impl CacheIf for FixedLatencyCache {
    fn read(&mut self, _access: &MemAccess, _now: u64) -> CacheAccessResult {
        self.reads += 1;
        self.answer()
    }

    fn write(&mut self, _access: &MemAccess, _now: u64) -> CacheAccessResult {
        self.writes += 1;
        self.answer()
    }

    fn is_stall_required(&self, _now: u64) -> bool {
        false
    }

    fn static_latency(&self) -> u64 {
        self.latency
    }

    fn first_level(&self) -> Option<&Cache> {
        None
    }
}
