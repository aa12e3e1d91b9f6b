//! # Op Arena Tests
//!
//! Property tests for slot reuse and stale-handle detection.

use o3sim_core::core::op::{Op, OpArena, OpHandle};
use o3sim_core::emu::{OpClass, OpInfo};
use proptest::prelude::*;

fn nop(handle: OpHandle, pc: u64) -> Op {
    Op::new(handle, 0, 0, pc, OpInfo::new(OpClass::Nop, pc + 4))
}

#[derive(Clone, Debug)]
enum Action {
    Allocate,
    Release(usize),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Allocate),
        any::<usize>().prop_map(Action::Release),
    ]
}

proptest! {
    /// A released handle never resolves again, even after its slot is reused, while every
    /// live handle keeps resolving to the op it was issued for.
    #[test]
    fn prop_stale_handles_never_resolve(actions in prop::collection::vec(action(), 1..200)) {
        let mut arena = OpArena::new(8);
        let mut live: Vec<(OpHandle, u64)> = Vec::new();
        let mut dead: Vec<OpHandle> = Vec::new();
        let mut next_pc = 0x1000;

        for action in actions {
            match action {
                Action::Allocate => {
                    let pc = next_pc;
                    next_pc += 4;
                    match arena.allocate(|h| nop(h, pc)) {
                        Some(h) => live.push((h, pc)),
                        None => {
                            prop_assert_eq!(live.len(), arena.capacity());
                        }
                    }
                }
                Action::Release(pick) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (h, pc) = live.swap_remove(pick % live.len());
                    let op = arena.release(h);
                    prop_assert_eq!(op.map(|o| o.pc), Some(pc));
                    prop_assert!(arena.release(h).is_none(), "double release succeeded");
                    dead.push(h);
                }
            }

            prop_assert_eq!(arena.len(), live.len());
            for &(h, pc) in &live {
                prop_assert_eq!(arena.get(h).map(|o| o.pc), Some(pc));
            }
            for &h in &dead {
                prop_assert!(!arena.is_live(h), "stale handle {} resolved", h);
            }
        }
    }
}

/// The arena refuses to allocate beyond its capacity and frees slots on release.
#[test]
fn test_capacity_bound() {
    let mut arena = OpArena::new(2);
    let a = arena.allocate(|h| nop(h, 0)).unwrap();
    let _b = arena.allocate(|h| nop(h, 4)).unwrap();
    assert!(arena.allocate(|h| nop(h, 8)).is_none());
    assert_eq!(arena.free_count(), 0);
    let _ = arena.release(a).unwrap();
    let c = arena.allocate(|h| nop(h, 12)).unwrap();
    assert_eq!(c.index(), a.index(), "slot is reused");
    assert_ne!(c, a, "reused slot gets a new generation");
}

/// Indexing with a stale handle is a modeling bug and panics.
#[test]
#[should_panic(expected = "stale op handle")]
fn test_index_stale_panics() {
    let mut arena = OpArena::new(1);
    let h = arena.allocate(|h| nop(h, 0)).unwrap();
    let _ = arena.release(h);
    let _ = &arena[h];
}
