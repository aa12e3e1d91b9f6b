//! # Checkpoint Tests
//!
//! Round-trip properties of the checkpoint master and its ordering rules.

use o3sim_core::core::checkpoint::{CheckpointMaster, CheckpointSlot};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

proptest! {
    /// Backing up, mutating, committing older checkpoints and flushing younger ones, then
    /// recovering restores both providers to their backed-up values.
    #[test]
    fn prop_backup_recover_round_trip(
        initial in prop::collection::vec(any::<u32>(), 1..8),
        older in 0usize..4,
        younger in 0usize..4,
        edits in prop::collection::vec((any::<usize>(), any::<u32>()), 1..20),
        counter in any::<u64>(),
    ) {
        let mut master = CheckpointMaster::new(16);
        let table = master.register(initial.clone(), CheckpointSlot::Rename);
        let history = master.register(counter, CheckpointSlot::Fetch);

        let older_ids: Vec<_> = (0..older).map(|_| master.create().unwrap()).collect();
        for &id in &older_ids {
            master.backup(id, CheckpointSlot::Fetch).unwrap();
            master.backup(id, CheckpointSlot::Rename).unwrap();
        }

        let target = master.create().unwrap();
        master.backup(target, CheckpointSlot::Fetch).unwrap();
        master.backup(target, CheckpointSlot::Rename).unwrap();
        let saved_table = master.data(table).clone();
        let saved_history = *master.data(history);

        let younger_ids: Vec<_> = (0..younger).map(|_| master.create().unwrap()).collect();
        for (i, value) in edits {
            let len = master.data(table).len();
            master.data_mut(table)[i % len] = value;
            let next = master.data(history).wrapping_add(1);
            *master.data_mut(history) = next;
        }

        for id in older_ids {
            master.commit(id).unwrap();
        }
        for id in younger_ids.into_iter().rev() {
            master.flush(id).unwrap();
        }

        master.recover(target).unwrap();
        prop_assert_eq!(master.data(table), &saved_table);
        prop_assert_eq!(*master.data(history), saved_history);
        prop_assert_eq!(master.len(), 1);
    }
}

/// A provider backed up in one slot only is untouched by recovery of a checkpoint that
/// never captured it.
#[test]
fn test_slot_without_snapshot_keeps_value() {
    let mut master = CheckpointMaster::new(4);
    let fetch = master.register(1u32, CheckpointSlot::Fetch);
    let rename = master.register(10u32, CheckpointSlot::Rename);
    let id = master.create().unwrap();
    master.backup(id, CheckpointSlot::Fetch).unwrap();
    *master.data_mut(fetch) = 2;
    *master.data_mut(rename) = 20;
    master.recover(id).unwrap();
    assert_eq!(*master.data(fetch), 1);
    assert_eq!(*master.data(rename), 20);
}

/// Commit only accepts the oldest checkpoint and flush only the youngest.
#[test]
fn test_commit_and_flush_order() {
    let mut master = CheckpointMaster::new(4);
    let a = master.create().unwrap();
    let b = master.create().unwrap();
    assert!(master.commit(b).is_err());
    assert!(master.flush(a).is_err());
    master.flush(b).unwrap();
    master.commit(a).unwrap();
    assert!(master.is_empty());
    assert!(master.recover(a).is_err(), "recovery of a committed checkpoint");
}

/// Capacity is enforced and reported through `can_create`.
#[test]
fn test_capacity() {
    let mut master = CheckpointMaster::new(2);
    assert!(master.can_create(2));
    let _a = master.create().unwrap();
    let _b = master.create().unwrap();
    assert!(!master.can_create(1));
    assert!(master.create().is_err());
}
