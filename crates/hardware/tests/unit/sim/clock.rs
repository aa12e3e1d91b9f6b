//! # Clock Tests
//!
//! Phase ordering seen from outside the crate and error propagation out of updates.

use o3sim_core::sim::clock::{Clock, Clocked, EventContext, Phase, Priority, Update};
use o3sim_core::sim::wheel::Prioritized;
use o3sim_core::{SimError, SimResult};
use pretty_assertions::assert_eq;

#[derive(Debug)]
struct Tick;

impl Prioritized for Tick {
    fn priority(&self) -> Priority {
        Priority::Event
    }
}

#[derive(Default)]
struct Board {
    value: u64,
    seen: Vec<(&'static str, u64)>,
    phases: Vec<Phase>,
}

impl EventContext for Board {
    type Event = Tick;

    fn take_due_events(&mut self) -> Vec<Tick> {
        Vec::new()
    }

    fn take_immediate(&mut self) -> Option<Tick> {
        None
    }

    fn evaluate_event(&self, _event: Tick) -> Option<Update<Self>> {
        None
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }
}

/// Doubles the board value, reading it during evaluate.
struct Doubler(Priority);

impl Clocked<Board> for Doubler {
    fn name(&self) -> &'static str {
        "doubler"
    }

    fn priority(&self) -> Priority {
        self.0
    }

    fn evaluate(&self, ctx: &Board) -> Option<Update<Board>> {
        let seen = ctx.value;
        Some(Box::new(move |b: &mut Board| {
            b.seen.push(("doubler", seen));
            b.value = seen * 2;
            Ok(())
        }))
    }
}

/// Adds one to whatever value its update finds.
struct Adder;

impl Clocked<Board> for Adder {
    fn name(&self) -> &'static str {
        "adder"
    }

    fn priority(&self) -> Priority {
        Priority::Commit
    }

    fn evaluate(&self, ctx: &Board) -> Option<Update<Board>> {
        let seen = ctx.value;
        Some(Box::new(move |b: &mut Board| {
            b.seen.push(("adder", seen));
            b.value += 1;
            Ok(())
        }))
    }
}

struct Failing;

impl Clocked<Board> for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn priority(&self) -> Priority {
        Priority::Stage
    }

    fn evaluate(&self, _ctx: &Board) -> Option<Update<Board>> {
        Some(Box::new(|_b: &mut Board| -> SimResult<()> {
            Err(SimError::invariant("boom"))
        }))
    }
}

/// Both units evaluate against the pre-cycle value, while updates apply in priority order
/// regardless of registration order.
#[test]
fn test_evaluate_sees_pre_cycle_state() {
    let mut clock: Clock<Board> = Clock::new();
    clock.register(Box::new(Adder));
    clock.register(Box::new(Doubler(Priority::Stage)));
    assert_eq!(clock.unit_names(), vec!["doubler", "adder"]);

    let mut board = Board {
        value: 3,
        ..Board::default()
    };
    clock.tick(&mut board).unwrap();
    assert_eq!(board.seen, vec![("doubler", 3), ("adder", 3)]);
    assert_eq!(board.value, 7);
    assert_eq!(
        board.phases,
        vec![
            Phase::Begin,
            Phase::Evaluate,
            Phase::Transition,
            Phase::Update,
            Phase::End,
            Phase::Idle
        ]
    );
    assert_eq!(clock.cycle(), 1);
}

/// An update error aborts the cycle without advancing the counter.
#[test]
fn test_update_error_propagates() {
    let mut clock: Clock<Board> = Clock::new();
    clock.register(Box::new(Failing));
    clock.register(Box::new(Adder));
    let mut board = Board::default();
    let err = clock.tick(&mut board).unwrap_err();
    assert!(matches!(err, SimError::Invariant(_)));
    assert_eq!(clock.cycle(), 0);
    assert!(board.seen.is_empty(), "later updates did not run");
}
