//! Select policies.

use std::fmt;

use crate::core::op::{OpArena, OpHandle};

/// Orders ready ops by selection priority.
pub trait Selector: fmt::Debug {
    /// Returns `ready` sorted so the op to select first comes first.
    fn order(&self, ops: &OpArena, ready: &[OpHandle]) -> Vec<OpHandle>;
}

/// Selects the oldest ready ops first, across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct OldestFirst;

impl Selector for OldestFirst {
    fn order(&self, ops: &OpArena, ready: &[OpHandle]) -> Vec<OpHandle> {
        let mut order = ready.to_vec();
        order.sort_by_key(|&h| ops[h].global_serial);
        order
    }
}
