//! Per-thread program-order list.
//!
//! The in-order list holds every live op of a thread from fetch until retirement. It provides:
//! 1. **In-flight tail:** `push_back` at fetch and `pop_back` when squashing.
//! 2. **Commit:** Moves the in-flight front into the committed sub-sequence.
//! 3. **Retirement:** Pops the committed front once it has retired.
//! 4. **Navigation:** Next/previous op and instruction-boundary queries used by recovery.

use std::collections::VecDeque;

use crate::common::{SimError, SimResult};
use crate::core::op::{OpArena, OpHandle};

/// Program-ordered ops of one thread.
#[derive(Clone, Debug)]
pub struct InorderList {
    capacity: usize,
    in_flight: VecDeque<OpHandle>,
    committed: VecDeque<OpHandle>,
}

impl InorderList {
    /// Creates an empty list holding at most `capacity` ops.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_flight: VecDeque::with_capacity(capacity),
            committed: VecDeque::new(),
        }
    }

    /// Maximum live ops.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live ops, committed or not.
    pub fn len(&self) -> usize {
        self.in_flight.len() + self.committed.len()
    }

    /// True if no op is live.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty() && self.committed.is_empty()
    }

    /// True if `n` more ops fit.
    pub fn can_push(&self, n: usize) -> bool {
        self.len() + n <= self.capacity
    }

    /// Ops not yet committed.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Committed ops awaiting retirement.
    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Appends a freshly fetched op.
    pub fn push_back(&mut self, op: OpHandle) {
        self.in_flight.push_back(op);
    }

    /// Removes the youngest in-flight op.
    pub fn pop_back(&mut self) -> Option<OpHandle> {
        self.in_flight.pop_back()
    }

    /// Oldest in-flight op.
    pub fn front(&self) -> Option<OpHandle> {
        self.in_flight.front().copied()
    }

    /// Youngest in-flight op.
    pub fn back(&self) -> Option<OpHandle> {
        self.in_flight.back().copied()
    }

    /// In-flight op at `index` from the front.
    pub fn get(&self, index: usize) -> Option<OpHandle> {
        self.in_flight.get(index).copied()
    }

    /// Oldest committed op.
    pub fn committed_front(&self) -> Option<OpHandle> {
        self.committed.front().copied()
    }

    /// Moves `op` from the in-flight front to the committed sub-sequence.
    pub fn commit(&mut self, op: OpHandle) -> SimResult<()> {
        if self.in_flight.front() != Some(&op) {
            return Err(SimError::invariant(format!(
                "commit of {op}, which is not the oldest in-flight op"
            )));
        }
        let _ = self.in_flight.pop_front();
        self.committed.push_back(op);
        Ok(())
    }

    /// Removes the oldest committed op.
    pub fn pop_committed(&mut self) -> Option<OpHandle> {
        self.committed.pop_front()
    }

    fn position(&self, op: OpHandle) -> Option<usize> {
        self.in_flight.iter().position(|&h| h == op)
    }

    /// True if `op` is in flight.
    pub fn contains(&self, op: OpHandle) -> bool {
        self.position(op).is_some()
    }

    /// In-flight op right after `op`.
    pub fn next_op(&self, op: OpHandle) -> Option<OpHandle> {
        self.position(op).and_then(|i| self.get(i + 1))
    }

    /// In-flight op right before `op`.
    pub fn prev_op(&self, op: OpHandle) -> Option<OpHandle> {
        self.position(op)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.get(i))
    }

    /// First micro-op of the instruction containing `op`.
    pub fn front_op_of_same_pc(&self, ops: &OpArena, op: OpHandle) -> OpHandle {
        let mut cur = op;
        while ops[cur].info.micro_index > 0 {
            match self.prev_op(cur) {
                Some(prev) => cur = prev,
                None => break,
            }
        }
        cur
    }

    /// First micro-op of the instruction after the one containing `op`.
    pub fn next_pc_op(&self, ops: &OpArena, op: OpHandle) -> Option<OpHandle> {
        let start = self.position(op)?;
        self.in_flight
            .iter()
            .skip(start + 1)
            .copied()
            .find(|&h| ops[h].info.micro_index == 0)
    }

    /// Micro-ops of the instruction containing `op` that come after it.
    pub fn later_micro_ops(&self, ops: &OpArena, op: OpHandle) -> Vec<OpHandle> {
        let Some(start) = self.position(op) else {
            return Vec::new();
        };
        self.in_flight
            .iter()
            .skip(start + 1)
            .copied()
            .take_while(|&h| ops[h].info.micro_index > 0)
            .collect()
    }

    /// Last micro-op of the instruction before the one containing `op`.
    pub fn prev_pc_op(&self, ops: &OpArena, op: OpHandle) -> Option<OpHandle> {
        self.prev_op(self.front_op_of_same_pc(ops, op))
    }

    /// In-flight ops from `op` (inclusive) to the youngest.
    pub fn from_op(&self, op: OpHandle) -> Vec<OpHandle> {
        self.position(op)
            .map(|i| self.in_flight.iter().skip(i).copied().collect())
            .unwrap_or_default()
    }

    /// In-flight ops, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = OpHandle> + '_ {
        self.in_flight.iter().copied()
    }

    /// Committed ops, oldest first.
    pub fn committed(&self) -> impl Iterator<Item = OpHandle> + '_ {
        self.committed.iter().copied()
    }
}
