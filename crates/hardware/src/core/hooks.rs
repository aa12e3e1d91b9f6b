//! Pipeline extension points.
//!
//! Observers are registered once, before the simulator is built, and invoked synchronously
//! at each op state transition. Around each transition the order is: every observer's
//! `enter` (registration order), every `before` closure, the transition itself, every
//! `after` closure, then every observer's `exit` (reverse registration order).

use std::fmt;

use crate::core::op::Op;

/// Op state transitions that can be observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Op allocated and placed in the in-order list.
    Fetch,
    /// Registers renamed.
    Rename,
    /// Op placed into a scheduler.
    Dispatch,
    /// Op picked by a scheduler's selector.
    Select,
    /// Op sent toward its execution unit.
    Issue,
    /// Execution started.
    Execute,
    /// Result produced.
    Finish,
    /// Op returned to its scheduler by recovery.
    Reschedule,
    /// Op committed.
    Commit,
    /// Op retired.
    Retire,
    /// Op squashed.
    Flush,
}

impl HookPoint {
    const COUNT: usize = 11;

    const fn index(self) -> usize {
        self as usize
    }
}

/// Closure run before or after a transition.
pub type HookFn = Box<dyn FnMut(HookPoint, &Op)>;

/// Observer wrapped around every transition.
pub trait OpObserver {
    /// Called before the transition.
    fn enter(&mut self, point: HookPoint, op: &Op);

    /// Called after the transition.
    fn exit(&mut self, point: HookPoint, op: &Op);
}

/// Registered hooks.
pub struct Hooks {
    before: Vec<Vec<HookFn>>,
    after: Vec<Vec<HookFn>>,
    observers: Vec<Box<dyn OpObserver>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.iter().map(Vec::len).sum::<usize>())
            .field("after", &self.after.iter().map(Vec::len).sum::<usize>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

impl Hooks {
    /// Creates an empty hook set.
    pub fn new() -> Self {
        let mut before = Vec::with_capacity(HookPoint::COUNT);
        before.resize_with(HookPoint::COUNT, Vec::new);
        let mut after = Vec::with_capacity(HookPoint::COUNT);
        after.resize_with(HookPoint::COUNT, Vec::new);
        Self {
            before,
            after,
            observers: Vec::new(),
        }
    }

    /// Registers a closure run before `point`.
    pub fn before(mut self, point: HookPoint, hook: impl FnMut(HookPoint, &Op) + 'static) -> Self {
        self.before[point.index()].push(Box::new(hook));
        self
    }

    /// Registers a closure run after `point`.
    pub fn after(mut self, point: HookPoint, hook: impl FnMut(HookPoint, &Op) + 'static) -> Self {
        self.after[point.index()].push(Box::new(hook));
        self
    }

    /// Registers an observer wrapped around every point.
    pub fn observe(mut self, observer: impl OpObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
            && self.before.iter().all(Vec::is_empty)
            && self.after.iter().all(Vec::is_empty)
    }

    /// Runs the entry side of `point`.
    pub(crate) fn enter(&mut self, point: HookPoint, op: &Op) {
        for observer in &mut self.observers {
            observer.enter(point, op);
        }
        for hook in &mut self.before[point.index()] {
            hook(point, op);
        }
    }

    /// Runs the exit side of `point`.
    pub(crate) fn exit(&mut self, point: HookPoint, op: &Op) {
        for hook in &mut self.after[point.index()] {
            hook(point, op);
        }
        for observer in self.observers.iter_mut().rev() {
            observer.exit(point, op);
        }
    }
}
