//! First-In, First-Out (FIFO) replacement policy.
//!
//! Evicts ways in fill order regardless of hits, as a round-robin pointer per set.

use super::ReplacementPolicy;

/// FIFO policy state.
#[derive(Debug, Clone)]
pub struct FifoPolicy {
    /// Next way to evict in each set.
    next: Vec<usize>,
    ways: usize,
}

impl FifoPolicy {
    /// Creates a policy for `sets` sets of `ways` ways.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            next: vec![0; sets],
            ways: ways.max(1),
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn touch(&mut self, _set: usize, _way: usize) {}

    fn fill(&mut self, set: usize, way: usize) {
        if self.next[set] == way {
            self.next[set] = (way + 1) % self.ways;
        }
    }

    fn victim(&self, set: usize) -> usize {
        self.next[set]
    }
}
