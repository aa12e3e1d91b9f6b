//! Return Address Stack (RAS).
//!
//! The RAS predicts return targets. Calls push their fall-through address and returns pop
//! it. Each thread registers its stack as a fetch-slot checkpoint provider, so a recovery
//! restores it along with the global history. A push into a full stack overwrites the
//! oldest entry.

use crate::emu::{LinkHint, OpInfo};

/// Return Address Stack structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ras {
    /// Circular storage.
    stack: Vec<u64>,
    /// Slot of the next push.
    top: usize,
    /// Valid entries.
    depth: usize,
}

impl Ras {
    /// Creates an empty stack with `capacity` entries. A zero capacity never predicts.
    pub fn new(capacity: usize) -> Self {
        Self {
            stack: vec![0; capacity],
            top: 0,
            depth: 0,
        }
    }

    /// Valid entries.
    pub fn len(&self) -> usize {
        self.depth
    }

    /// True if no return address is held.
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// Pushes a return address onto the stack.
    pub fn push(&mut self, addr: u64) {
        let capacity = self.stack.len();
        if capacity == 0 {
            return;
        }
        self.stack[self.top] = addr;
        self.top = (self.top + 1) % capacity;
        self.depth = (self.depth + 1).min(capacity);
    }

    /// Pops the most recent return address, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<u64> {
        if self.depth == 0 {
            return None;
        }
        let capacity = self.stack.len();
        self.top = (self.top + capacity - 1) % capacity;
        self.depth -= 1;
        Some(self.stack[self.top])
    }

    /// Most recent return address without removing it.
    pub fn top(&self) -> Option<u64> {
        if self.depth == 0 {
            return None;
        }
        let capacity = self.stack.len();
        Some(self.stack[(self.top + capacity - 1) % capacity])
    }

    /// Applies the call or return role of the micro-op described by `info`.
    ///
    /// # Returns
    ///
    /// The predicted target when `info` is a return and the stack is not empty.
    pub fn update(&mut self, info: &OpInfo) -> Option<u64> {
        if !info.is_last_micro_op() {
            return None;
        }
        match info.link {
            LinkHint::Call => {
                self.push(info.fallthrough);
                None
            }
            LinkHint::Return => self.pop(),
            LinkHint::None => None,
        }
    }
}
