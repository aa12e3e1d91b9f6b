//! Register Rename Stage.
//!
//! Takes ops from the fetch latch in order, maps their logical sources through the thread's
//! speculative rename map and gives every destination a fresh physical register. The
//! previous mapping is kept on the op and freed when the op retires. Memory ops also get
//! their predicted store dependence here, in program order.

use crate::common::{SimError, SimResult};
use crate::core::Core;
use crate::core::checkpoint::CheckpointSlot;
use crate::core::hooks::HookPoint;
use crate::core::op::{OpHandle, OpStatus};
use crate::sim::clock::{Clocked, Priority, Update};

/// The rename stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenameStage;

impl Clocked<Core> for RenameStage {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn priority(&self) -> Priority {
        Priority::Stage
    }

    fn evaluate(&self, core: &Core) -> Option<Update<Core>> {
        let width = core
            .config()
            .pipeline
            .rename_width
            .min(core.latches.rename_dispatch.room());
        let mut free = core.regs.free_count();
        let mut picked = Vec::new();
        for h in core.latches.fetch_rename.peek(width) {
            let dsts = core.ops[h].info.dsts.len();
            if dsts > free {
                break;
            }
            free -= dsts;
            picked.push(h);
        }
        if picked.is_empty() {
            return None;
        }
        Some(Box::new(move |core: &mut Core| {
            for h in picked {
                if !core.latches.fetch_rename.pop_if_front(h) {
                    break;
                }
                core.rename(h)?;
            }
            Ok(())
        }))
    }
}

impl Core {
    fn rename(&mut self, h: OpHandle) -> SimResult<()> {
        self.hook_enter(HookPoint::Rename, h);
        let tid = self.ops[h].tid;
        if let Some(id) = self.ops[h].before_checkpoint {
            self.threads[tid].checkpoints.backup(id, CheckpointSlot::Rename)?;
        }

        let thread = &mut self.threads[tid];
        let map_handle = thread.rename_map;
        let op = &mut self.ops[h];
        let map = thread.checkpoints.data_mut(map_handle);
        op.srcs = op.info.srcs.iter().map(|&r| map.get(r)).collect();
        op.dsts.clear();
        op.prev_dsts.clear();
        for &logical in &op.info.dsts {
            let phys = self
                .regs
                .allocate()
                .ok_or_else(|| SimError::invariant("physical register file exhausted at rename"))?;
            op.dsts.push(phys);
            op.prev_dsts.push(map.set(logical, phys));
        }
        let (pc, class) = (op.pc, op.info.class);
        self.ops[h].mem_dep = self.threads[tid].mem_dep.rename(h, pc, class);

        if let Some(id) = self.ops[h].after_checkpoint {
            self.threads[tid].checkpoints.backup(id, CheckpointSlot::Rename)?;
        }
        self.set_status(h, OpStatus::Rename);
        self.latches.rename_dispatch.push(h);
        self.hook_exit(HookPoint::Rename, h);
        Ok(())
    }
}
