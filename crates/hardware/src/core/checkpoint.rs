//! Checkpoint subsystem.
//!
//! This module implements rollback points for speculative state. It provides:
//! 1. **Tokens:** `CheckpointId`, unique per thread and never reused.
//! 2. **Providers:** Any `Clone` state registered once through `register`, addressed by a typed
//!    `DataHandle<T>`. The master does not know what the providers represent.
//! 3. **Slots:** Each provider is backed up at one pipeline point (`Fetch` or `Rename`), so an
//!    op's checkpoint can hold front-end state captured at fetch and rename state captured
//!    later at rename.
//! 4. **Lifecycle:** Checkpoints are created in program order, committed from the oldest end
//!    and flushed from the youngest end. Capacity is bounded.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;

use crate::common::{SimError, SimResult};

/// Identifier of one checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointId(u64);

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ckpt#{}", self.0)
    }
}

/// Pipeline point at which a provider is backed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckpointSlot {
    /// Captured when the op is fetched.
    Fetch,
    /// Captured when the op is renamed.
    Rename,
}

/// Typed handle to a registered provider.
pub struct DataHandle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DataHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DataHandle<T> {}

impl<T> fmt::Debug for DataHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHandle({})", self.index)
    }
}

/// Type-erased provider storage.
trait Provider: fmt::Debug {
    fn slot(&self) -> CheckpointSlot;
    fn backup(&mut self, id: CheckpointId);
    fn recover(&mut self, id: CheckpointId) -> bool;
    fn release(&mut self, id: CheckpointId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Current value of a provider plus its snapshots.
#[derive(Debug)]
struct Snapshotted<T> {
    slot: CheckpointSlot,
    current: T,
    snapshots: HashMap<CheckpointId, T>,
}

impl<T: Clone + fmt::Debug + 'static> Provider for Snapshotted<T> {
    fn slot(&self) -> CheckpointSlot {
        self.slot
    }

    fn backup(&mut self, id: CheckpointId) {
        let _prev = self.snapshots.insert(id, self.current.clone());
    }

    fn recover(&mut self, id: CheckpointId) -> bool {
        match self.snapshots.get(&id) {
            Some(saved) => {
                self.current = saved.clone();
                true
            }
            None => false,
        }
    }

    fn release(&mut self, id: CheckpointId) {
        let _saved = self.snapshots.remove(&id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owner of a thread's checkpoints and checkpointed providers.
#[derive(Debug)]
pub struct CheckpointMaster {
    capacity: usize,
    next_id: u64,
    live: VecDeque<CheckpointId>,
    providers: Vec<Box<dyn Provider>>,
}

impl CheckpointMaster {
    /// Creates a master that holds at most `capacity` live checkpoints.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 0,
            live: VecDeque::with_capacity(capacity),
            providers: Vec::new(),
        }
    }

    /// Registers a provider with its initial value, backed up at `slot`.
    pub fn register<T: Clone + fmt::Debug + 'static>(
        &mut self,
        initial: T,
        slot: CheckpointSlot,
    ) -> DataHandle<T> {
        self.providers.push(Box::new(Snapshotted {
            slot,
            current: initial,
            snapshots: HashMap::new(),
        }));
        DataHandle {
            index: self.providers.len() - 1,
            _marker: PhantomData,
        }
    }

    /// Current value of a provider.
    pub fn data<T: 'static>(&self, handle: DataHandle<T>) -> &T {
        let provider = self.providers[handle.index].as_any();
        match provider.downcast_ref::<Snapshotted<T>>() {
            Some(p) => &p.current,
            None => panic!("checkpoint provider {} has a different type", handle.index),
        }
    }

    /// Current value of a provider, mutably.
    pub fn data_mut<T: 'static>(&mut self, handle: DataHandle<T>) -> &mut T {
        let provider = self.providers[handle.index].as_any_mut();
        match provider.downcast_mut::<Snapshotted<T>>() {
            Some(p) => &mut p.current,
            None => panic!("checkpoint provider {} has a different type", handle.index),
        }
    }

    /// Maximum live checkpoints.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live checkpoints.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True if no checkpoint is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// True if `n` more checkpoints fit.
    pub fn can_create(&self, n: usize) -> bool {
        self.live.len() + n <= self.capacity
    }

    /// True if `id` is live.
    pub fn is_live(&self, id: CheckpointId) -> bool {
        self.live.contains(&id)
    }

    /// Creates a checkpoint younger than every live one.
    pub fn create(&mut self) -> SimResult<CheckpointId> {
        if !self.can_create(1) {
            return Err(SimError::invariant(format!(
                "checkpoint capacity {} exhausted",
                self.capacity
            )));
        }
        let id = CheckpointId(self.next_id);
        self.next_id += 1;
        self.live.push_back(id);
        Ok(id)
    }

    fn ensure_live(&self, id: CheckpointId, what: &str) -> SimResult<()> {
        if self.is_live(id) {
            Ok(())
        } else {
            Err(SimError::invariant(format!("{what} of dead checkpoint {id}")))
        }
    }

    /// Copies the current value of every provider of `slot` into `id`.
    pub fn backup(&mut self, id: CheckpointId, slot: CheckpointSlot) -> SimResult<()> {
        self.ensure_live(id, "backup")?;
        for provider in self.providers.iter_mut().filter(|p| p.slot() == slot) {
            provider.backup(id);
        }
        Ok(())
    }

    /// Discards the oldest checkpoint, which must be `id`.
    pub fn commit(&mut self, id: CheckpointId) -> SimResult<()> {
        if self.live.front() != Some(&id) {
            return Err(SimError::invariant(format!(
                "commit of {id}, which is not the oldest checkpoint"
            )));
        }
        let _ = self.live.pop_front();
        self.release(id);
        Ok(())
    }

    /// Discards the youngest checkpoint, which must be `id`.
    pub fn flush(&mut self, id: CheckpointId) -> SimResult<()> {
        if self.live.back() != Some(&id) {
            return Err(SimError::invariant(format!(
                "flush of {id}, which is not the youngest checkpoint"
            )));
        }
        let _ = self.live.pop_back();
        self.release(id);
        Ok(())
    }

    /// Restores every provider that has a snapshot in `id`. Others keep their value.
    pub fn recover(&mut self, id: CheckpointId) -> SimResult<()> {
        self.ensure_live(id, "recovery")?;
        for provider in &mut self.providers {
            let _restored = provider.recover(id);
        }
        Ok(())
    }

    fn release(&mut self, id: CheckpointId) {
        for provider in &mut self.providers {
            provider.release(id);
        }
    }
}
