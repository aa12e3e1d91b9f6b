//! Op arena.
//!
//! Fixed-capacity slot storage for in-flight ops. Releasing a slot bumps its generation so
//! every outstanding handle to the old op becomes stale. Looking up a stale handle through
//! `Index` is a modeling bug and panics; `get` returns `None` instead.

use std::ops::{Index, IndexMut};

use super::{Op, OpHandle};

#[derive(Debug)]
struct Slot {
    generation: u32,
    op: Option<Op>,
}

/// Generation-checked op storage.
#[derive(Debug)]
pub struct OpArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl OpArena {
    /// Creates an arena of `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    generation: 0,
                    op: None,
                })
                .collect(),
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live ops.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True if no op is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Allocates a slot and stores the op built from its handle.
    ///
    /// # Returns
    ///
    /// The handle, or `None` if the arena is full. Callers check `free_count` first.
    pub fn allocate(&mut self, build: impl FnOnce(OpHandle) -> Op) -> Option<OpHandle> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index as usize];
        let handle = OpHandle::new(index, slot.generation);
        slot.op = Some(build(handle));
        Some(handle)
    }

    /// Releases the op behind `handle` and returns it.
    ///
    /// Returns `None` and changes nothing if the handle is stale.
    pub fn release(&mut self, handle: OpHandle) -> Option<Op> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation() || slot.op.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index() as u32);
        slot.op.take()
    }

    /// True if `handle` refers to a live op.
    pub fn is_live(&self, handle: OpHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Looks up a live op.
    pub fn get(&self, handle: OpHandle) -> Option<&Op> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.op.as_ref())
    }

    /// Looks up a live op mutably.
    pub fn get_mut(&mut self, handle: OpHandle) -> Option<&mut Op> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.op.as_mut())
    }

    /// Iterates over live ops in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.slots.iter().filter_map(|slot| slot.op.as_ref())
    }
}

impl Index<OpHandle> for OpArena {
    type Output = Op;

    fn index(&self, handle: OpHandle) -> &Op {
        match self.get(handle) {
            Some(op) => op,
            None => panic!("stale op handle {handle}"),
        }
    }
}

impl IndexMut<OpHandle> for OpArena {
    fn index_mut(&mut self, handle: OpHandle) -> &mut Op {
        match self.get_mut(handle) {
            Some(op) => op,
            None => panic!("stale op handle {handle}"),
        }
    }
}
