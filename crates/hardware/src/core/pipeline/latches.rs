//! Pipeline latches for inter-stage communication.
//!
//! This module defines the queues carried between the front-end stages:
//! Fetch → Rename → Dispatch.
//!
//! 1. **Ordering:** Ops leave a latch in the order they entered it.
//! 2. **Skid space:** A latch holds two stage widths, so a stage that evaluated against the
//!    pre-cycle occupancy never overflows when its producer and consumer update in the same
//!    cycle.
//! 3. **Squash:** `retain_live` drops handles whose ops were flushed.

use std::collections::VecDeque;

use crate::core::op::{OpArena, OpHandle};

/// FIFO of op handles between two stages.
#[derive(Clone, Debug)]
pub struct Latch {
    capacity: usize,
    entries: VecDeque<OpHandle>,
}

impl Latch {
    /// Creates a latch for a stage of `width` ops per cycle.
    pub fn new(width: usize) -> Self {
        let capacity = width * 2;
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the latch holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free entries.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    /// Appends an op.
    pub fn push(&mut self, op: OpHandle) {
        self.entries.push_back(op);
    }

    /// The first `n` entries, without removing them.
    pub fn peek(&self, n: usize) -> Vec<OpHandle> {
        self.entries.iter().take(n).copied().collect()
    }

    /// Removes `op` if it is at the front.
    pub fn pop_if_front(&mut self, op: OpHandle) -> bool {
        if self.entries.front() == Some(&op) {
            let _ = self.entries.pop_front();
            true
        } else {
            false
        }
    }

    /// Drops handles of released ops.
    pub fn retain_live(&mut self, ops: &OpArena) {
        self.entries.retain(|&h| ops.is_live(h));
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = OpHandle> + '_ {
        self.entries.iter().copied()
    }
}

/// The latches of the front end.
#[derive(Clone, Debug)]
pub struct Latches {
    /// Fetch to rename.
    pub fetch_rename: Latch,
    /// Rename to dispatch.
    pub rename_dispatch: Latch,
}

impl Latches {
    /// Creates the latches for the given stage widths.
    pub fn new(fetch_width: usize, rename_width: usize) -> Self {
        Self {
            fetch_rename: Latch::new(fetch_width),
            rename_dispatch: Latch::new(rename_width),
        }
    }

    /// Drops handles of released ops from every latch.
    pub fn retain_live(&mut self, ops: &OpArena) {
        self.fetch_rename.retain_live(ops);
        self.rename_dispatch.retain_live(ops);
    }

    /// True if both latches are empty.
    pub fn is_empty(&self) -> bool {
        self.fetch_rename.is_empty() && self.rename_dispatch.is_empty()
    }
}
