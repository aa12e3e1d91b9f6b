//! Least Recently Used (LRU) replacement policy.
//!
//! Each set keeps a recency stack of its ways. A hit or fill moves the way to the top
//! (most recently used); the victim is the way at the bottom.
//!
//! # Performance
//!
//! - `touch()` / `fill()`: O(W) where W is the associativity
//! - `victim()`: O(1)

use super::ReplacementPolicy;

/// LRU policy state.
#[derive(Debug, Clone)]
pub struct LruPolicy {
    /// Recency stack per set. Index 0 is MRU, the last index is LRU.
    stacks: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Creates a policy for `sets` sets of `ways` ways.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            stacks: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }

    fn promote(&mut self, set: usize, way: usize) {
        let stack = &mut self.stacks[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        self.promote(set, way);
    }

    fn fill(&mut self, set: usize, way: usize) {
        self.promote(set, way);
    }

    fn victim(&self, set: usize) -> usize {
        self.stacks[set].last().copied().unwrap_or(0)
    }
}
