//! # Time Wheel Tests
//!
//! Events must fire exactly at their due cycle, in scheduling order.

use o3sim_core::SimError;
use o3sim_core::sim::wheel::TimeWheel;
use proptest::prelude::*;

proptest! {
    /// Every event fires `delay` advances after it was scheduled, and events due in the
    /// same cycle keep their scheduling order.
    #[test]
    fn prop_events_fire_on_time(
        plan in prop::collection::vec((0u64..40, 1u64..16), 1..100),
    ) {
        let mut wheel = TimeWheel::new(16);
        let mut expected: Vec<(u64, usize)> = Vec::new();
        let horizon = plan.iter().map(|&(at, _)| at).max().unwrap_or(0) + 16;

        let mut fired: Vec<(u64, usize)> = Vec::new();
        for now in 0..=horizon {
            for (id, &(at, delay)) in plan.iter().enumerate() {
                if at == now {
                    wheel.schedule(id, delay).unwrap();
                    expected.push((now + delay, id));
                }
            }
            for id in wheel.advance() {
                fired.push((now + 1, id));
            }
        }

        expected.sort_by_key(|&(due, _)| due);
        prop_assert_eq!(fired, expected);
        prop_assert!(wheel.is_empty());
    }
}

/// Delays outside `1..size` are rejected.
#[test]
fn test_delay_bounds() {
    let mut wheel = TimeWheel::new(8);
    assert!(matches!(
        wheel.schedule((), 0),
        Err(SimError::EventDelay { delay: 0, size: 8 })
    ));
    assert!(wheel.schedule((), 8).is_err());
    assert!(wheel.schedule((), 7).is_ok());
    assert_eq!(wheel.pending(), 1);
}
