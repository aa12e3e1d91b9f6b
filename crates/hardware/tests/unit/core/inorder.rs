//! # In-order List Tests
//!
//! Program order must hold across every fetch, squash, commit and retirement.

use o3sim_core::core::op::{Op, OpArena, OpHandle};
use o3sim_core::core::pipeline::inorder::InorderList;
use o3sim_core::emu::{OpClass, OpInfo};
use proptest::prelude::*;

#[derive(Clone, Copy, Debug)]
enum Step {
    Fetch,
    Squash,
    Commit,
    Retire,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Fetch),
        1 => Just(Step::Squash),
        2 => Just(Step::Commit),
        2 => Just(Step::Retire),
    ]
}

fn push(ops: &mut OpArena, list: &mut InorderList, serial: u64) -> OpHandle {
    let pc = 0x1000 + 4 * serial;
    let h = ops
        .allocate(|h| {
            let mut op = Op::new(h, 0, 0, pc, OpInfo::new(OpClass::IntAlu, pc + 4));
            op.serial = serial;
            op
        })
        .unwrap();
    list.push_back(h);
    h
}

proptest! {
    /// Serial numbers stay strictly increasing from the oldest committed op to the youngest
    /// in-flight op.
    #[test]
    fn prop_program_order(steps in prop::collection::vec(step(), 1..300)) {
        let mut ops = OpArena::new(64);
        let mut list = InorderList::new(64);
        let mut serial = 0;

        for step in steps {
            match step {
                Step::Fetch => {
                    if list.can_push(1) {
                        let _ = push(&mut ops, &mut list, serial);
                        serial += 1;
                    }
                }
                Step::Squash => {
                    if let Some(h) = list.pop_back() {
                        let _ = ops.release(h);
                    }
                }
                Step::Commit => {
                    if let Some(h) = list.front() {
                        list.commit(h).unwrap();
                    }
                }
                Step::Retire => {
                    if let Some(h) = list.pop_committed() {
                        let _ = ops.release(h);
                    }
                }
            }

            let serials: Vec<u64> = list
                .committed()
                .chain(list.iter())
                .map(|h| ops[h].serial)
                .collect();
            prop_assert!(
                serials.windows(2).all(|w| w[0] < w[1]),
                "out of order: {:?}",
                serials
            );
            prop_assert_eq!(list.len(), ops.len());
        }
    }
}

/// Only the oldest in-flight op may commit.
#[test]
fn test_commit_requires_front() {
    let mut ops = OpArena::new(4);
    let mut list = InorderList::new(4);
    let _a = push(&mut ops, &mut list, 0);
    let b = push(&mut ops, &mut list, 1);
    assert!(list.commit(b).is_err());
}

/// Instruction-boundary navigation skips over the micro-ops of one instruction.
#[test]
fn test_micro_op_navigation() {
    let mut ops = OpArena::new(8);
    let mut list = InorderList::new(8);
    let first = push(&mut ops, &mut list, 0);
    let mut handles = Vec::new();
    for i in 0..2u8 {
        let h = ops
            .allocate(|h| {
                let mut info = OpInfo::new(OpClass::Load, 0x1008);
                info.micro_index = i;
                info.micro_count = 2;
                let mut op = Op::new(h, 0, 0, 0x1004, info);
                op.serial = 1 + u64::from(i);
                op
            })
            .unwrap();
        list.push_back(h);
        handles.push(h);
    }
    let last = push(&mut ops, &mut list, 3);

    assert_eq!(list.front_op_of_same_pc(&ops, handles[1]), handles[0]);
    assert_eq!(list.next_pc_op(&ops, handles[0]), Some(last));
    assert_eq!(list.prev_pc_op(&ops, handles[1]), Some(first));
    assert_eq!(list.from_op(handles[1]), vec![handles[1], last]);
    assert_eq!(list.next_op(last), None);
}
