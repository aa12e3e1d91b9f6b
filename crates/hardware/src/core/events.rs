//! Deferred op events.
//!
//! Every event names one op and records the op's epochs at scheduling time. An event whose
//! op was released, rescheduled or flushed since then is dropped when it comes due.

use crate::core::op::{Op, OpHandle};
use crate::sim::clock::Priority;
use crate::sim::wheel::Prioritized;

/// What a deferred event does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpEventKind {
    /// The op's results become visible to scheduler `target`.
    WakeUp {
        /// Scheduler whose consumers are woken.
        target: usize,
    },
    /// The op reaches its execution unit.
    Execute,
    /// The op's result is produced.
    Finish,
    /// Write-back starts.
    WriteBackBegin,
    /// Write-back completes.
    WriteBackEnd,
    /// A load's predicted latency elapsed; check whether it really finished.
    DetectLatPredMiss,
    /// A committed op retires.
    Retire,
}

/// An op event waiting on the time wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpEvent {
    /// Target op.
    pub op: OpHandle,
    /// Event epoch of the op when scheduled.
    pub epoch: u32,
    /// Wake-up epoch of the op when scheduled.
    pub wakeup_epoch: u32,
    /// Action.
    pub kind: OpEventKind,
}

impl OpEvent {
    /// Creates an event for `op` stamped with its current epochs.
    pub fn new(op: &Op, kind: OpEventKind) -> Self {
        Self {
            op: op.handle,
            epoch: op.epochs.event,
            wakeup_epoch: op.epochs.wakeup,
            kind,
        }
    }

    /// True if the event still applies to `op`.
    pub fn matches(&self, op: &Op) -> bool {
        if op.epochs.event != self.epoch {
            return false;
        }
        match self.kind {
            OpEventKind::WakeUp { .. } => op.epochs.wakeup == self.wakeup_epoch,
            _ => true,
        }
    }
}

impl Prioritized for OpEvent {
    fn priority(&self) -> Priority {
        match self.kind {
            OpEventKind::WakeUp { .. } => Priority::WakeUp,
            OpEventKind::DetectLatPredMiss => Priority::DetectLatPredMiss,
            OpEventKind::Execute | OpEventKind::Finish => Priority::ExecutionFinish,
            OpEventKind::WriteBackBegin | OpEventKind::WriteBackEnd | OpEventKind::Retire => {
                Priority::Event
            }
        }
    }
}
