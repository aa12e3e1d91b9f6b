//! Dispatch Stage.
//!
//! Moves renamed ops into their schedulers and, for loads and stores, into the thread's
//! memory-order queues. Dispatch is in order: the first op that does not fit stops the
//! group. Ops that need no execution (nop, system call, undefined) bypass the schedulers
//! and wait for commit.

use crate::core::Core;
use crate::core::hooks::HookPoint;
use crate::core::op::{OpHandle, OpStatus};
use crate::emu::OpClass;
use crate::sim::clock::{Clocked, Priority, Update};

/// The dispatch stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct DispatchStage;

impl Clocked<Core> for DispatchStage {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn priority(&self) -> Priority {
        Priority::Stage
    }

    fn evaluate(&self, core: &Core) -> Option<Update<Core>> {
        let width = core.config().pipeline.dispatch_width;
        let mut per_scheduler = vec![0usize; core.schedulers.len()];
        let mut mem_classes: Vec<Vec<OpClass>> = vec![Vec::new(); core.threads.len()];
        let mut picked = Vec::new();

        for h in core.latches.rename_dispatch.peek(width) {
            let op = &core.ops[h];
            let class = op.info.class;
            if !class.skips_execution() {
                let Some(s) = core.scheduler_for(class) else {
                    break;
                };
                if !core.schedulers[s].can_allocate(per_scheduler[s] + 1) {
                    break;
                }
                if class.is_mem() {
                    let classes = &mut mem_classes[op.tid];
                    classes.push(class);
                    if !core.threads[op.tid].mem_order.can_allocate(classes) {
                        break;
                    }
                }
                per_scheduler[s] += 1;
            }
            picked.push(h);
        }
        if picked.is_empty() {
            return None;
        }
        Some(Box::new(move |core: &mut Core| {
            for h in picked {
                if !core.latches.rename_dispatch.pop_if_front(h) {
                    break;
                }
                core.dispatch(h);
            }
            Ok(())
        }))
    }
}

impl Core {
    fn dispatch(&mut self, h: OpHandle) {
        self.hook_enter(HookPoint::Dispatch, h);
        let class = self.ops[h].info.class;
        match self.scheduler_for(class) {
            Some(s) if !class.skips_execution() => {
                self.set_status(h, OpStatus::Dispatching);
                let tid = self.ops[h].tid;
                for &src in &self.ops[h].srcs {
                    self.regs.add_consumer(src, h);
                }
                self.ops[h].scheduler = Some(s);
                self.threads[tid].mem_order.allocate(&self.ops, h);
                self.set_status(h, OpStatus::Dispatched);
                self.schedulers[s].dispatch_end(&self.regs, &self.ops[h]);
            }
            _ => {
                for &dst in &self.ops[h].dsts {
                    self.regs.set_fully_ready(dst);
                }
                self.set_status(h, OpStatus::Nop);
            }
        }
        self.hook_exit(HookPoint::Dispatch, h);
    }
}
