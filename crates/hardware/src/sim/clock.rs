//! Two-phase cycle driver.
//!
//! This module implements the per-cycle phase engine. It provides:
//! 1. **Phases:** Begin, Evaluate, Transition, Update, End, run for every registered unit.
//! 2. **Priorities:** A total order over units and deferred events within one cycle.
//! 3. **Deferred updates:** `Evaluate` receives the shared context by shared reference and
//!    returns a boxed update closure. Only the Update phase gets `&mut` access, so no unit can
//!    observe another unit's decisions from the same cycle.
//!
//! Events due in a cycle are evaluated before the units of the same priority and their
//! updates run in that same order. Zero-delay events raised during an update run immediately
//! after the update that raised them.

use super::wheel::{Prioritized, PriorityEventList};
use crate::common::SimResult;

/// Processing order within a cycle. Earlier variants run first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Wake-up of consumers whose producer result becomes visible.
    WakeUp,
    /// Default priority for op events (issue, execute, write-back, retire).
    Event,
    /// Pipeline stages and schedulers.
    Stage,
    /// Detection of load latency mispredictions.
    DetectLatPredMiss,
    /// Execution completion, where branch and memory-order checks happen.
    ExecutionFinish,
    /// Commit, processed last so it sees every completion of the cycle.
    Commit,
}

impl Priority {
    /// Number of priority levels.
    pub const COUNT: usize = 6;

    /// Every level in processing order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::WakeUp,
        Self::Event,
        Self::Stage,
        Self::DetectLatPredMiss,
        Self::ExecutionFinish,
        Self::Commit,
    ];

    /// Bucket index of this level.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Phase currently being executed by the clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles.
    #[default]
    Idle,
    /// Per-cycle setup.
    Begin,
    /// Units decide what would happen this cycle.
    Evaluate,
    /// Units may withdraw their decision (stall).
    Transition,
    /// Decisions are applied to shared state.
    Update,
    /// Per-cycle teardown.
    End,
}

/// Work decided during Evaluate and applied during Update.
pub type Update<C> = Box<dyn FnOnce(&mut C) -> SimResult<()>>;

/// A component driven once per cycle.
pub trait Clocked<C> {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Ordering class of this unit.
    fn priority(&self) -> Priority;

    /// Per-cycle setup.
    fn begin(&mut self, _ctx: &mut C) {}

    /// Decides this cycle's work against pre-cycle state.
    ///
    /// Returns the update to apply, or `None` if the unit has nothing to do.
    fn evaluate(&self, ctx: &C) -> Option<Update<C>>;

    /// Confirms or withdraws the evaluated work once every unit has evaluated.
    fn transition(&self, _ctx: &C, pending: Option<Update<C>>) -> Option<Update<C>> {
        pending
    }

    /// Per-cycle teardown.
    fn end(&mut self, _ctx: &mut C) {}
}

/// Shared state the clock drives, including its deferred events.
pub trait EventContext: Sized + 'static {
    /// Deferred event type.
    type Event: Prioritized;

    /// Advances the time wheel and returns the events due this cycle.
    fn take_due_events(&mut self) -> Vec<Self::Event>;

    /// Pops a zero-delay event raised during the current update, if any.
    fn take_immediate(&mut self) -> Option<Self::Event>;

    /// Decides what a due event will do. `None` drops the event (e.g. it was cancelled).
    fn evaluate_event(&self, event: Self::Event) -> Option<Update<Self>>;

    /// Notifies the context that the clock entered `phase`.
    fn set_phase(&mut self, _phase: Phase) {}
}

enum Planned<C> {
    Event(Update<C>),
    Unit(usize, Option<Update<C>>),
}

/// Drives registered units and deferred events through the cycle phases.
pub struct Clock<C: EventContext> {
    units: Vec<Box<dyn Clocked<C>>>,
    due: PriorityEventList<C::Event>,
    cycle: u64,
}

impl<C: EventContext> std::fmt::Debug for Clock<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("units", &self.unit_names())
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl<C: EventContext> Default for Clock<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: EventContext> Clock<C> {
    /// Creates a clock with no units.
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            due: PriorityEventList::new(),
            cycle: 0,
        }
    }

    /// Registers a unit. Units of equal priority run in registration order.
    pub fn register(&mut self, unit: Box<dyn Clocked<C>>) {
        let priority = unit.priority();
        let pos = self
            .units
            .iter()
            .position(|u| u.priority() > priority)
            .unwrap_or(self.units.len());
        self.units.insert(pos, unit);
    }

    /// Number of completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Unit names in processing order.
    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Runs one full cycle.
    ///
    /// # Returns
    ///
    /// The first error raised by an update. The cycle counter is not advanced on error.
    pub fn tick(&mut self, ctx: &mut C) -> SimResult<()> {
        ctx.set_phase(Phase::Begin);
        for unit in &mut self.units {
            unit.begin(ctx);
        }
        let due = ctx.take_due_events();
        self.due.extend(due);

        ctx.set_phase(Phase::Evaluate);
        let mut planned: Vec<Planned<C>> = Vec::new();
        {
            let view: &C = ctx;
            let mut next_unit = 0;
            for priority in Priority::ALL {
                for event in self.due.take(priority) {
                    if let Some(update) = view.evaluate_event(event) {
                        planned.push(Planned::Event(update));
                    }
                }
                while next_unit < self.units.len() && self.units[next_unit].priority() == priority
                {
                    let pending = self.units[next_unit].evaluate(view);
                    planned.push(Planned::Unit(next_unit, pending));
                    next_unit += 1;
                }
            }
        }

        ctx.set_phase(Phase::Transition);
        {
            let view: &C = ctx;
            for entry in &mut planned {
                if let Planned::Unit(index, pending) = entry {
                    *pending = self.units[*index].transition(view, pending.take());
                }
            }
        }

        ctx.set_phase(Phase::Update);
        for entry in planned {
            let update = match entry {
                Planned::Event(update) | Planned::Unit(_, Some(update)) => update,
                Planned::Unit(_, None) => continue,
            };
            update(&mut *ctx)?;
            while let Some(event) = ctx.take_immediate() {
                if let Some(update) = ctx.evaluate_event(event) {
                    update(&mut *ctx)?;
                }
            }
        }

        ctx.set_phase(Phase::End);
        for unit in &mut self.units {
            unit.end(ctx);
        }
        ctx.set_phase(Phase::Idle);
        self.cycle += 1;
        Ok(())
    }
}
