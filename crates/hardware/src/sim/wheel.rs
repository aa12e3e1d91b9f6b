//! Deferred event storage.
//!
//! This module holds the two containers behind the clock's event handling. It provides:
//! 1. **Time wheel:** A ring of per-cycle buckets indexed by `(now + delay) % size`, giving
//!    O(1) scheduling and O(1) amortized firing.
//! 2. **Priority event list:** Per-priority FIFO buckets that order the events due in one
//!    cycle relative to each other and to clocked units.
//!
//! Events scheduled for the same absolute cycle and the same priority fire in the order they
//! were scheduled.

use super::clock::Priority;
use crate::common::{SimError, SimResult};

/// Anything that can be placed on the clock's event list.
pub trait Prioritized {
    /// Ordering class of the event within its cycle.
    fn priority(&self) -> Priority;
}

/// Ring buffer of per-cycle event buckets.
#[derive(Debug)]
pub struct TimeWheel<E> {
    slots: Vec<Vec<E>>,
    current: usize,
    pending: usize,
}

impl<E> TimeWheel<E> {
    /// Creates a wheel with `size` slots.
    ///
    /// The longest schedulable delay is `size - 1` cycles. A size below 2 is raised to 2.
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, Vec::new);
        Self {
            slots,
            current: 0,
            pending: 0,
        }
    }

    /// Number of slots in the wheel.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Number of events waiting in the wheel.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Returns true if no events are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Schedules `event` to fire `delay` cycles after the current one.
    ///
    /// # Arguments
    ///
    /// * `event` - The event to defer.
    /// * `delay` - Cycles from now; must be in `1..size`.
    ///
    /// # Returns
    ///
    /// `SimError::EventDelay` if the delay is zero or does not fit the wheel.
    pub fn schedule(&mut self, event: E, delay: u64) -> SimResult<()> {
        let size = self.slots.len();
        if delay == 0 || delay >= size as u64 {
            return Err(SimError::EventDelay { delay, size });
        }
        let slot = (self.current + delay as usize) % size;
        self.slots[slot].push(event);
        self.pending += 1;
        Ok(())
    }

    /// Moves to the next cycle and returns every event due in it, in scheduling order.
    pub fn advance(&mut self) -> Vec<E> {
        self.current = (self.current + 1) % self.slots.len();
        let due = std::mem::take(&mut self.slots[self.current]);
        self.pending -= due.len();
        due
    }
}

/// Per-priority FIFO buckets for the events due in the current cycle.
#[derive(Debug)]
pub struct PriorityEventList<E> {
    buckets: Vec<Vec<E>>,
}

impl<E: Prioritized> Default for PriorityEventList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Prioritized> PriorityEventList<E> {
    /// Creates an empty list with one bucket per priority.
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(Priority::COUNT);
        buckets.resize_with(Priority::COUNT, Vec::new);
        Self { buckets }
    }

    /// Sorts `events` into their buckets, keeping arrival order within each bucket.
    pub fn extend(&mut self, events: Vec<E>) {
        for event in events {
            self.buckets[event.priority().index()].push(event);
        }
    }

    /// Removes and returns every event of `priority`, oldest first.
    pub fn take(&mut self, priority: Priority) -> Vec<E> {
        std::mem::take(&mut self.buckets[priority.index()])
    }

    /// Total number of buffered events.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Returns true if every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
}
