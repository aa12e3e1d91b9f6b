//! Select Stage.
//!
//! Every scheduler picks up to its issue width of ready ops, oldest first by default. Memory
//! ops are held back while the data cache asks for a stall. A picked op is issued in the
//! update: its execution unit is reserved for the arrival cycle and its execution and
//! wake-up events are scheduled.

use crate::common::SimResult;
use crate::core::Core;
use crate::core::hooks::HookPoint;
use crate::core::op::{OpHandle, OpStatus};
use crate::sim::clock::{Clocked, Priority, Update};

/// The select stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectStage;

impl Clocked<Core> for SelectStage {
    fn name(&self) -> &'static str {
        "select"
    }

    fn priority(&self) -> Priority {
        Priority::Stage
    }

    fn evaluate(&self, core: &Core) -> Option<Update<Core>> {
        let now = core.cycle();
        let stalled = core.caches.is_stall_required(now);
        let picked: Vec<(usize, OpHandle)> = core
            .schedulers
            .iter()
            .enumerate()
            .flat_map(|(s, scheduler)| {
                scheduler
                    .plan_select(&core.ops, now, stalled)
                    .into_iter()
                    .map(move |h| (s, h))
            })
            .collect();
        if picked.is_empty() {
            return None;
        }
        Some(Box::new(move |core: &mut Core| {
            for (s, h) in picked {
                let still_waiting = core
                    .ops
                    .get(h)
                    .is_some_and(|op| op.status == OpStatus::Dispatched && op.scheduler == Some(s));
                if still_waiting {
                    core.select_op(s, h)?;
                }
            }
            Ok(())
        }))
    }
}

impl Core {
    fn select_op(&mut self, s: usize, h: OpHandle) -> SimResult<()> {
        self.hook_enter(HookPoint::Select, h);
        let now = self.cycle();
        let issued = self.schedulers[s].issue(&self.ops[h], now);
        self.hook_exit(HookPoint::Select, h);
        if issued {
            self.issue(s, h)?;
        }
        Ok(())
    }
}
