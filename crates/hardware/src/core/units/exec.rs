//! Execution unit reservation.
//!
//! Every scheduler owns a pool of execution unit groups. Selection reserves an instance for
//! the cycle the op reaches its unit. A pipelined instance accepts a new op every cycle; a
//! non-pipelined instance stays busy for the full latency.

use crate::config::SchedulerConfig;
use crate::emu::OpClass;

/// A group of identical execution units.
#[derive(Clone, Debug)]
struct UnitGroup {
    classes: Vec<OpClass>,
    latency: u64,
    pipelined: bool,
    /// First cycle at which each instance can accept an op.
    free_at: Vec<u64>,
}

/// Execution units of one scheduler.
#[derive(Clone, Debug)]
pub struct ExecUnitPool {
    groups: Vec<UnitGroup>,
}

impl ExecUnitPool {
    /// Builds the pool described by a scheduler's configuration.
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            groups: config
                .units
                .iter()
                .map(|u| UnitGroup {
                    classes: u.classes.clone(),
                    latency: u.latency,
                    pipelined: u.pipelined,
                    free_at: vec![0; u.count],
                })
                .collect(),
        }
    }

    /// Index of the group that executes `class`.
    pub fn group_of(&self, class: OpClass) -> Option<usize> {
        self.groups.iter().position(|g| g.classes.contains(&class))
    }

    /// Execution latency of `class`.
    pub fn latency(&self, class: OpClass) -> Option<u64> {
        self.group_of(class).map(|g| self.groups[g].latency)
    }

    /// Instances of `group` that can accept an op at cycle `at`.
    pub fn free_count(&self, group: usize, at: u64) -> usize {
        self.groups[group]
            .free_at
            .iter()
            .filter(|&&free| free <= at)
            .count()
    }

    /// Reserves an instance of `group` for an op arriving at cycle `at`.
    ///
    /// # Returns
    ///
    /// False if every instance is busy at `at`.
    pub fn reserve(&mut self, group: usize, at: u64) -> bool {
        let g = &mut self.groups[group];
        let busy = if g.pipelined { 1 } else { g.latency };
        match g.free_at.iter_mut().find(|free| **free <= at) {
            Some(slot) => {
                *slot = at + busy;
                true
            }
            None => false,
        }
    }
}
